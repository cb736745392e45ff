//! The action abstraction.
//!
//! An [`Action`] is an immutable executable unit: it names the events it
//! awaits, the events it emits on success, and carries metadata for
//! reporting. The executor owns all mutable bookkeeping.

use std::fmt;

use async_trait::async_trait;

use converge_cloud::{CallContext, Cloud};
use converge_resource::ResourceId;

use crate::error::Result;
use crate::event::{Event, EventList};

/// What kind of cloud mutation an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Creates the resource.
    Create,
    /// Replaces the resource with a full desired payload.
    Update,
    /// Deletes the resource.
    Delete,
    /// No mutation; asserts existence for downstream actions.
    Exists,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Exists => "exists",
        };
        f.write_str(text)
    }
}

/// Reporting metadata attached to every action.
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    /// Unique name, e.g. `create(healthChecks:p/global/hc1)`.
    pub name: String,
    /// Mutation kind.
    pub kind: ActionKind,
    /// The resource the action operates on.
    pub subject: ResourceId,
    /// Human-readable summary.
    pub summary: String,
}

impl ActionMetadata {
    /// Standard metadata for `kind` applied to `subject`.
    #[must_use]
    pub fn for_kind(kind: ActionKind, subject: ResourceId) -> Self {
        Self {
            name: format!("{kind}({subject})"),
            summary: format!("{kind} {subject}"),
            kind,
            subject,
        }
    }
}

/// An immutable executable unit in the action DAG.
#[async_trait]
pub trait Action: Send + Sync {
    /// Reporting metadata; `metadata().name` keys execution results.
    fn metadata(&self) -> &ActionMetadata;

    /// Events that must be signaled before this action may run.
    fn wants(&self) -> &[Event];

    /// Events emitted when this action succeeds.
    fn events(&self) -> &[Event];

    /// Perform the action's cloud calls and return the emitted events.
    async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> Result<EventList>;

    /// The events a successful run would emit, with no I/O.
    fn dry_run(&self) -> EventList {
        self.events().to_vec()
    }

    /// Display form; decorators may annotate it.
    fn describe(&self) -> String {
        self.metadata().name.clone()
    }
}

/// An event-only action asserting that a resource exists.
///
/// Emitted for plan rows that need no cloud mutation, so downstream
/// preconditions on the resource are still satisfied.
pub struct ExistsAction {
    metadata: ActionMetadata,
    events: Vec<Event>,
}

impl ExistsAction {
    /// Assert that `id` exists.
    #[must_use]
    pub fn new(id: ResourceId) -> Self {
        Self {
            metadata: ActionMetadata::for_kind(ActionKind::Exists, id.clone()),
            events: vec![Event::Exists(id)],
        }
    }
}

#[async_trait]
impl Action for ExistsAction {
    fn metadata(&self) -> &ActionMetadata {
        &self.metadata
    }

    fn wants(&self) -> &[Event] {
        &[]
    }

    fn events(&self) -> &[Event] {
        &self.events
    }

    async fn run(&self, _ctx: &CallContext, _cloud: &Cloud) -> Result<EventList> {
        Ok(self.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use converge_cloud::FakeTransport;

    use super::*;

    #[tokio::test]
    async fn test_exists_action_emits_without_io() {
        let id = ResourceId::global("p", "healthChecks", "hc1");
        let action = ExistsAction::new(id.clone());

        assert_eq!(action.metadata().name, format!("exists({id})"));
        assert!(action.wants().is_empty());
        assert_eq!(action.dry_run(), vec![Event::Exists(id.clone())]);

        let transport = Arc::new(FakeTransport::new());
        let cloud = Cloud::unlimited(transport.clone());
        let ctx = CallContext::new();
        let events = action.run(&ctx, &cloud).await;
        assert_eq!(events.ok(), Some(vec![Event::Exists(id)]));
        assert!(transport.calls().is_empty());
    }
}
