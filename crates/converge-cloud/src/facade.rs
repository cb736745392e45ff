//! The cloud facade: rate-limited access to resource collections.
//!
//! [`Cloud`] is the only surface the planner and actions talk to. It pairs
//! a wire [`Transport`] with a configured [`RateLimiter`]; every operation
//! runs `accept` before the wire call and `observe` after. Typed accessors
//! (`health_checks()`, `backend_services()`, ...) wrap the same gated
//! operations for direct callers.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use converge_resource::{ApiVersion, Frozen, ResourceId, Schema, Scope};

use crate::compute::{BackendService, HealthCheck, NetworkEndpointGroup};
use crate::context::CallContext;
use crate::error::{CloudError, Result};
use crate::key::CallKey;
use crate::ratelimit::{NopRateLimiter, RateLimiter};

/// Wire-level operations over frozen structural payloads.
///
/// Implementations must be safe for concurrent call dispatch; the engine
/// issues calls from parallel planner fetches and executor branches.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch a resource. [`CloudError::NotFound`] when absent.
    async fn get(&self, ctx: &CallContext, id: &ResourceId) -> Result<Frozen>;

    /// Create a resource. [`CloudError::AlreadyExists`] on collision.
    async fn insert(&self, ctx: &CallContext, resource: &Frozen) -> Result<()>;

    /// Replace a resource with a full desired payload.
    async fn update(&self, ctx: &CallContext, resource: &Frozen) -> Result<()>;

    /// Delete a resource.
    async fn delete(&self, ctx: &CallContext, id: &ResourceId) -> Result<()>;

    /// List a project's resources in one collection.
    async fn list(&self, ctx: &CallContext, project: &str, collection: &str)
        -> Result<Vec<Frozen>>;
}

/// Shared handle over a transport and its admission control.
#[derive(Clone)]
pub struct Cloud {
    transport: Arc<dyn Transport>,
    limiter: Arc<dyn RateLimiter>,
}

impl Cloud {
    /// Create a facade gating `transport` behind `limiter`.
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { transport, limiter }
    }

    /// Create a facade with no admission control, for tests and tools.
    pub fn unlimited(transport: Arc<dyn Transport>) -> Self {
        Self::new(transport, Arc::new(NopRateLimiter))
    }

    /// Typed access to global health checks.
    #[must_use]
    pub fn health_checks(&self) -> ResourceClient<'_, HealthCheck> {
        ResourceClient::new(self, ScopeKind::Global)
    }

    /// Typed access to global backend services.
    #[must_use]
    pub fn backend_services(&self) -> ResourceClient<'_, BackendService> {
        ResourceClient::new(self, ScopeKind::Global)
    }

    /// Typed access to regional backend services.
    #[must_use]
    pub fn region_backend_services(&self) -> ResourceClient<'_, BackendService> {
        ResourceClient::new(self, ScopeKind::Regional)
    }

    /// Typed access to zonal network endpoint groups.
    #[must_use]
    pub fn network_endpoint_groups(&self) -> ResourceClient<'_, NetworkEndpointGroup> {
        ResourceClient::new(self, ScopeKind::Zonal)
    }

    /// Fetch a resource by id, rate-limited. Used by the planner.
    pub async fn get_frozen(&self, ctx: &CallContext, id: &ResourceId) -> Result<Frozen> {
        let key = self.key_for(id, "get");
        self.limiter.accept(ctx, Some(&key)).await?;
        debug!(id = %id, "cloud get");
        let result = self.transport.get(ctx, id).await;
        self.limiter
            .observe(ctx, result.as_ref().err(), Some(&key))
            .await;
        result
    }

    /// Create a resource, rate-limited. Used by create actions.
    pub async fn insert_frozen(&self, ctx: &CallContext, resource: &Frozen) -> Result<()> {
        let key = self.key_for(resource.id(), "insert");
        self.limiter.accept(ctx, Some(&key)).await?;
        debug!(id = %resource.id(), "cloud insert");
        let result = self.transport.insert(ctx, resource).await;
        self.limiter
            .observe(ctx, result.as_ref().err(), Some(&key))
            .await;
        result
    }

    /// Replace a resource with a full desired payload, rate-limited.
    pub async fn update_frozen(&self, ctx: &CallContext, resource: &Frozen) -> Result<()> {
        let key = self.key_for(resource.id(), "update");
        self.limiter.accept(ctx, Some(&key)).await?;
        debug!(id = %resource.id(), "cloud update");
        let result = self.transport.update(ctx, resource).await;
        self.limiter
            .observe(ctx, result.as_ref().err(), Some(&key))
            .await;
        result
    }

    /// Delete a resource by id, rate-limited.
    pub async fn delete_frozen(&self, ctx: &CallContext, id: &ResourceId) -> Result<()> {
        let key = self.key_for(id, "delete");
        self.limiter.accept(ctx, Some(&key)).await?;
        debug!(id = %id, "cloud delete");
        let result = self.transport.delete(ctx, id).await;
        self.limiter
            .observe(ctx, result.as_ref().err(), Some(&key))
            .await;
        result
    }

    /// List a project's resources in one collection, rate-limited.
    pub async fn list_frozen(
        &self,
        ctx: &CallContext,
        project: &str,
        collection: &str,
    ) -> Result<Vec<Frozen>> {
        let key = CallKey::new(project, collection, "list");
        self.limiter.accept(ctx, Some(&key)).await?;
        debug!(project = %project, collection = %collection, "cloud list");
        let result = self.transport.list(ctx, project, collection).await;
        self.limiter
            .observe(ctx, result.as_ref().err(), Some(&key))
            .await;
        result
    }

    fn key_for(&self, id: &ResourceId, operation: &str) -> CallKey {
        CallKey::new(&id.project, &id.collection, operation)
    }
}

/// Scope a typed accessor expects of every id it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Global,
    Regional,
    Zonal,
}

impl ScopeKind {
    fn matches(self, scope: &Scope) -> bool {
        matches!(
            (self, scope),
            (Self::Global, Scope::Global)
                | (Self::Regional, Scope::Regional(_))
                | (Self::Zonal, Scope::Zonal(_))
        )
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Regional => "regional",
            Self::Zonal => "zonal",
        }
    }
}

/// Typed, scope-checked view over one resource collection.
pub struct ResourceClient<'a, T: Schema> {
    cloud: &'a Cloud,
    scope: ScopeKind,
    _payload: PhantomData<T>,
}

impl<'a, T: Schema> ResourceClient<'a, T> {
    fn new(cloud: &'a Cloud, scope: ScopeKind) -> Self {
        Self {
            cloud,
            scope,
            _payload: PhantomData,
        }
    }

    /// Reject ids of the wrong collection or scope before any wire call.
    fn check(&self, id: &ResourceId) -> Result<()> {
        let expected = T::metadata().collection;
        if id.collection != expected {
            return Err(converge_resource::Error::wrong_kind(expected, id.collection.clone()).into());
        }
        if !self.scope.matches(&id.scope) {
            return Err(CloudError::scope_mismatch(id, self.scope.describe()));
        }
        Ok(())
    }

    /// Fetch and decode one resource.
    pub async fn get(&self, ctx: &CallContext, id: &ResourceId) -> Result<T> {
        self.check(id)?;
        let frozen = self.cloud.get_frozen(ctx, id).await?;
        Ok(frozen.decode::<T>()?)
    }

    /// Create a resource from a typed payload.
    pub async fn insert(&self, ctx: &CallContext, id: &ResourceId, payload: &T) -> Result<()> {
        self.check(id)?;
        let frozen = Frozen::of_desired(id.clone(), ApiVersion::Ga, payload)?;
        self.cloud.insert_frozen(ctx, &frozen).await
    }

    /// Replace a resource with a full typed payload.
    pub async fn update(&self, ctx: &CallContext, id: &ResourceId, payload: &T) -> Result<()> {
        self.check(id)?;
        let frozen = Frozen::of_desired(id.clone(), ApiVersion::Ga, payload)?;
        self.cloud.update_frozen(ctx, &frozen).await
    }

    /// Delete a resource.
    pub async fn delete(&self, ctx: &CallContext, id: &ResourceId) -> Result<()> {
        self.check(id)?;
        self.cloud.delete_frozen(ctx, id).await
    }

    /// List and decode a project's resources in this collection.
    pub async fn list(&self, ctx: &CallContext, project: &str) -> Result<Vec<T>> {
        let frozen = self
            .cloud
            .list_frozen(ctx, project, T::metadata().collection)
            .await?;
        let mut out = Vec::with_capacity(frozen.len());
        for res in &frozen {
            out.push(res.decode::<T>()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::compute::{BACKEND_SERVICES, HEALTH_CHECKS};
    use crate::fake::FakeTransport;

    /// Records every accept/observe so call gating is assertable.
    #[derive(Default)]
    struct RecordingLimiter {
        accepts: Mutex<Vec<CallKey>>,
        observes: AtomicUsize,
    }

    #[async_trait]
    impl RateLimiter for RecordingLimiter {
        async fn accept(&self, _ctx: &CallContext, key: Option<&CallKey>) -> Result<()> {
            if let Ok(mut accepts) = self.accepts.lock() {
                accepts.push(key.cloned().unwrap_or_default());
            }
            Ok(())
        }

        async fn observe(
            &self,
            _ctx: &CallContext,
            _error: Option<&CloudError>,
            _key: Option<&CallKey>,
        ) {
            self.observes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hc_id(name: &str) -> ResourceId {
        ResourceId::global("proj", HEALTH_CHECKS, name)
    }

    #[tokio::test]
    async fn test_every_call_is_gated_and_observed() {
        let limiter = Arc::new(RecordingLimiter::default());
        let cloud = Cloud::new(Arc::new(FakeTransport::new()), limiter.clone());
        let ctx = CallContext::new();

        let hc = HealthCheck {
            check_type: "HTTP".to_string(),
            ..HealthCheck::default()
        };
        let id = hc_id("hc1");
        assert!(cloud.health_checks().insert(&ctx, &id, &hc).await.is_ok());
        assert!(cloud.health_checks().get(&ctx, &id).await.is_ok());
        assert!(cloud.health_checks().delete(&ctx, &id).await.is_ok());

        let accepts = limiter
            .accepts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default();
        let ops: Vec<&str> = accepts.iter().map(|k| k.operation.as_str()).collect();
        assert_eq!(ops, vec!["insert", "get", "delete"]);
        assert!(accepts.iter().all(|k| k.project == "proj"));
        assert!(accepts.iter().all(|k| k.service == HEALTH_CHECKS));
        assert_eq!(limiter.observes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_observed_and_surfaced() {
        let limiter = Arc::new(RecordingLimiter::default());
        let cloud = Cloud::new(Arc::new(FakeTransport::new()), limiter.clone());
        let ctx = CallContext::new();

        let result = cloud.health_checks().get(&ctx, &hc_id("missing")).await;
        assert!(matches!(result, Err(CloudError::NotFound { .. })));
        assert_eq!(limiter.observes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_scope_mismatch_is_rejected_before_the_wire() {
        let transport = Arc::new(FakeTransport::new());
        let cloud = Cloud::unlimited(transport.clone());
        let ctx = CallContext::new();

        // a regional id pushed through the global accessor
        let id = ResourceId::regional("proj", "us-east1", BACKEND_SERVICES, "bs1");
        let result = cloud
            .backend_services()
            .update(&ctx, &id, &BackendService::default())
            .await;
        assert!(matches!(result, Err(CloudError::ScopeMismatch { .. })));
        assert!(transport.calls().is_empty());

        // and the right accessor takes it
        let result = cloud
            .region_backend_services()
            .insert(&ctx, &id, &BackendService::default())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_collection_is_rejected() {
        let cloud = Cloud::unlimited(Arc::new(FakeTransport::new()));
        let ctx = CallContext::new();

        let id = ResourceId::global("proj", BACKEND_SERVICES, "bs1");
        let result = cloud.health_checks().get(&ctx, &id).await;
        assert!(matches!(result, Err(CloudError::Resource(_))));
    }
}
