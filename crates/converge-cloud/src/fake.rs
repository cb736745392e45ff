//! In-memory transport for tests.
//!
//! Stores frozen resources keyed by identity, fills server-assigned fields
//! on insert and update, records every call, and can be primed to fail
//! specific operations. All tests of the planner and executors run against
//! this transport.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use converge_resource::{Frozen, ResourceId};

use crate::context::CallContext;
use crate::error::{CloudError, Result};
use crate::facade::Transport;

/// One recorded wire call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Operation name: `get`, `insert`, `update`, `delete` or `list`.
    pub operation: String,
    /// Target id (the project/collection pseudo-id for `list`).
    pub id: ResourceId,
}

/// In-memory, mutex-protected fake cloud.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<HashMap<ResourceId, Frozen>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<VecDeque<(String, CloudError)>>,
}

impl FakeTransport {
    /// An empty fake cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed observed state directly, bypassing the wire surface.
    pub fn seed(&self, resource: Frozen) {
        let stored = fill_server_fields(&resource);
        if let Ok(mut state) = self.state.lock() {
            state.insert(resource.id().clone(), stored);
        }
    }

    /// Current stored value for an id, if present.
    #[must_use]
    pub fn resource(&self, id: &ResourceId) -> Option<Frozen> {
        self.state.lock().ok().and_then(|s| s.get(id).cloned())
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls of one operation kind, in order.
    #[must_use]
    pub fn calls_of(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Number of mutating calls (everything but `get`/`list`).
    #[must_use]
    pub fn mutation_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.operation != "get" && c.operation != "list")
            .count()
    }

    /// Prime the next call of `operation` to fail with `error`.
    ///
    /// Repeated priming queues failures in order.
    pub fn fail_next(&self, operation: impl Into<String>, error: CloudError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back((operation.into(), error));
        }
    }

    fn record(&self, operation: &str, id: &ResourceId) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                operation: operation.to_string(),
                id: id.clone(),
            });
        }
        if let Ok(mut failures) = self.failures.lock() {
            if let Some(pos) = failures.iter().position(|(op, _)| op == operation) {
                if let Some((_, error)) = failures.remove(pos) {
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, ctx: &CallContext, id: &ResourceId) -> Result<Frozen> {
        ctx.ensure_live()?;
        self.record("get", id)?;
        self.resource(id).ok_or_else(|| CloudError::not_found(id))
    }

    async fn insert(&self, ctx: &CallContext, resource: &Frozen) -> Result<()> {
        ctx.ensure_live()?;
        let id = resource.id().clone();
        self.record("insert", &id)?;
        let mut state = self.state.lock().map_err(poisoned)?;
        if state.contains_key(&id) {
            return Err(CloudError::already_exists(&id));
        }
        state.insert(id, fill_server_fields(resource));
        Ok(())
    }

    async fn update(&self, ctx: &CallContext, resource: &Frozen) -> Result<()> {
        ctx.ensure_live()?;
        let id = resource.id().clone();
        self.record("update", &id)?;
        let mut state = self.state.lock().map_err(poisoned)?;
        if !state.contains_key(&id) {
            return Err(CloudError::not_found(&id));
        }
        state.insert(id, fill_server_fields(resource));
        Ok(())
    }

    async fn delete(&self, ctx: &CallContext, id: &ResourceId) -> Result<()> {
        ctx.ensure_live()?;
        self.record("delete", id)?;
        let mut state = self.state.lock().map_err(poisoned)?;
        if state.remove(id).is_none() {
            return Err(CloudError::not_found(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        ctx: &CallContext,
        project: &str,
        collection: &str,
    ) -> Result<Vec<Frozen>> {
        ctx.ensure_live()?;
        let pseudo = ResourceId::global(project, collection, "*");
        self.record("list", &pseudo)?;
        let state = self.state.lock().map_err(poisoned)?;
        let mut out: Vec<Frozen> = state
            .values()
            .filter(|r| r.id().project == project && r.id().collection == collection)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id().cmp(b.id()));
        Ok(out)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CloudError {
    CloudError::transient("fake transport state poisoned")
}

/// Fill the fields a real server assigns on write.
fn fill_server_fields(resource: &Frozen) -> Frozen {
    let link = resource.self_link();
    resource
        .patched(|fields| {
            fields.insert("selfLink".to_string(), Value::String(link));
        })
        .unwrap_or_else(|_| resource.clone())
}
