//! Generic create, update and delete actions.
//!
//! These operate through the facade's untyped frozen-payload operations, so
//! one implementation serves every resource collection. Cloud APIs take
//! full payloads on write, so update carries the complete desired resource.

use async_trait::async_trait;

use converge_cloud::{CallContext, Cloud};
use converge_resource::{Frozen, ResourceId};

use crate::action::{Action, ActionKind, ActionMetadata};
use crate::error::{Error, Result};
use crate::event::{Event, EventList};

/// Creates a resource; emits `Exists` on success.
pub struct CreateAction {
    metadata: ActionMetadata,
    resource: Frozen,
    wants: Vec<Event>,
    events: Vec<Event>,
}

impl CreateAction {
    /// Create `resource` once every event in `wants` has been signaled.
    #[must_use]
    pub fn new(resource: Frozen, wants: Vec<Event>) -> Self {
        let id = resource.id().clone();
        Self {
            metadata: ActionMetadata::for_kind(ActionKind::Create, id.clone()),
            resource,
            wants,
            events: vec![Event::Exists(id)],
        }
    }
}

#[async_trait]
impl Action for CreateAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn wants(&self) -> &[Event] {
        &self.wants
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> Result<EventList> {
        cloud
            .insert_frozen(ctx, &self.resource)
            .await
            .map_err(|err| {
                Error::action(self.metadata.name.clone(), self.metadata.subject.clone(), err)
            })?;
        Ok(self.events.clone())
    }
}

/// Replaces a resource with the full desired payload; emits `Exists`.
pub struct UpdateAction {
    metadata: ActionMetadata,
    resource: Frozen,
    wants: Vec<Event>,
    events: Vec<Event>,
}

impl UpdateAction {
    /// Update to `resource` once every event in `wants` has been signaled.
    #[must_use]
    pub fn new(resource: Frozen, wants: Vec<Event>) -> Self {
        let id = resource.id().clone();
        Self {
            metadata: ActionMetadata::for_kind(ActionKind::Update, id.clone()),
            resource,
            wants,
            events: vec![Event::Exists(id)],
        }
    }
}

#[async_trait]
impl Action for UpdateAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn wants(&self) -> &[Event] {
        &self.wants
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> Result<EventList> {
        cloud
            .update_frozen(ctx, &self.resource)
            .await
            .map_err(|err| {
                Error::action(self.metadata.name.clone(), self.metadata.subject.clone(), err)
            })?;
        Ok(self.events.clone())
    }
}

/// Deletes a resource; emits `DoesNotExist` on success.
pub struct DeleteAction {
    metadata: ActionMetadata,
    wants: Vec<Event>,
    events: Vec<Event>,
}

impl DeleteAction {
    /// Delete `id` once every event in `wants` has been signaled.
    #[must_use]
    pub fn new(id: ResourceId, wants: Vec<Event>) -> Self {
        Self {
            metadata: ActionMetadata::for_kind(ActionKind::Delete, id.clone()),
            wants,
            events: vec![Event::DoesNotExist(id)],
        }
    }
}

#[async_trait]
impl Action for DeleteAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn wants(&self) -> &[Event] {
        &self.wants
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> Result<EventList> {
        cloud
            .delete_frozen(ctx, &self.metadata.subject)
            .await
            .map_err(|err| {
                Error::action(self.metadata.name.clone(), self.metadata.subject.clone(), err)
            })?;
        Ok(self.events.clone())
    }
}
