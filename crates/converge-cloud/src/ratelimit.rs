//! Composable admission control for cloud calls.
//!
//! Every wire call passes through [`RateLimiter::accept`] before it is
//! dispatched and [`RateLimiter::observe`] after it completes. Limiters
//! compose: a [`CompositeRateLimiter`] routes by service and operation, a
//! [`PerProjectRateLimiter`] fans out per project, and the leaf limiters
//! pace admissions. All waits are cancellation-observant: a cancelled
//! context surfaces as [`CloudError::Cancelled`], never as a new error.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

use crate::context::CallContext;
use crate::error::{CloudError, Result};
use crate::key::CallKey;

/// Admission control interposed on every cloud call.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Block until the call keyed by `key` may proceed.
    ///
    /// Returns [`CloudError::Cancelled`] if the context is cancelled while
    /// waiting.
    async fn accept(&self, ctx: &CallContext, key: Option<&CallKey>) -> Result<()>;

    /// Observe the outcome of a call previously admitted with the same key.
    ///
    /// The default implementation ignores the outcome; adaptive limiters
    /// may override it.
    async fn observe(&self, _ctx: &CallContext, _error: Option<&CloudError>, _key: Option<&CallKey>) {
    }
}

/// A blocking admission source, e.g. a token bucket from another library.
#[async_trait]
pub trait Acceptor: Send + Sync {
    /// Block until one admission is available.
    async fn accept(&self);
}

/// Adapts an [`Acceptor`] into a cancellation-observant [`RateLimiter`].
pub struct AcceptRateLimiter {
    acceptor: Arc<dyn Acceptor>,
}

impl AcceptRateLimiter {
    /// Wrap the given acceptor.
    pub fn new(acceptor: Arc<dyn Acceptor>) -> Self {
        Self { acceptor }
    }
}

#[async_trait]
impl RateLimiter for AcceptRateLimiter {
    async fn accept(&self, ctx: &CallContext, _key: Option<&CallKey>) -> Result<()> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(CloudError::Cancelled),
            _ = self.acceptor.accept() => Ok(()),
        }
    }
}

/// Emits one admission every `period / count`, pacing calls deterministically.
///
/// The first admission waits a full tick, so `count` admissions spread over
/// one `period`. The underlying timer is created on first use, so limiters
/// can be constructed outside a runtime.
pub struct TickerRateLimiter {
    tick: Duration,
    interval: Mutex<Option<Interval>>,
}

impl TickerRateLimiter {
    /// Allow `count` admissions per `period`.
    #[must_use]
    pub fn new(count: u32, period: Duration) -> Self {
        Self {
            tick: period / count.max(1),
            interval: Mutex::new(None),
        }
    }

    async fn admit(&self) {
        let mut guard = self.interval.lock().await;
        let interval = guard.get_or_insert_with(|| {
            let mut interval = interval_at(Instant::now() + self.tick, self.tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
    }
}

#[async_trait]
impl RateLimiter for TickerRateLimiter {
    async fn accept(&self, ctx: &CallContext, _key: Option<&CallKey>) -> Result<()> {
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(CloudError::Cancelled),
            _ = self.admit() => Ok(()),
        }
    }
}

/// Enforces a floor on how long each admission takes.
///
/// Wraps an inner limiter; when the inner admission returns faster than
/// `minimum`, the remainder is slept off. This turns bursty inner limiters
/// into a steady worst-case pace.
pub struct MinimumRateLimiter {
    /// Inner limiter consulted first.
    pub inner: Arc<dyn RateLimiter>,
    /// Minimum wall-clock duration of one admission.
    pub minimum: Duration,
}

#[async_trait]
impl RateLimiter for MinimumRateLimiter {
    async fn accept(&self, ctx: &CallContext, key: Option<&CallKey>) -> Result<()> {
        ctx.ensure_live()?;
        let start = Instant::now();
        self.inner.accept(ctx, key).await?;
        let elapsed = start.elapsed();
        if elapsed < self.minimum {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(CloudError::Cancelled),
                _ = tokio::time::sleep(self.minimum - elapsed) => {}
            }
        }
        Ok(())
    }

    async fn observe(&self, ctx: &CallContext, error: Option<&CloudError>, key: Option<&CallKey>) {
        self.inner.observe(ctx, error, key).await;
    }
}

/// Routes calls to registered limiters by `(service, operation)`.
///
/// Lookup order for a key `(project, service, operation)`; the project is
/// not a routing dimension here (see [`PerProjectRateLimiter`]):
///
/// 1. `(service, operation)` exact
/// 2. `(service, "")` service default
/// 3. `("", operation)` operation default
/// 4. the configured default
pub struct CompositeRateLimiter {
    default: Arc<dyn RateLimiter>,
    overrides: HashMap<(String, String), Arc<dyn RateLimiter>>,
}

impl CompositeRateLimiter {
    /// Create a composite with the given fallback limiter.
    pub fn new(default: Arc<dyn RateLimiter>) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    /// Install a limiter for `(service, operation)`; empty strings wildcard
    /// that dimension.
    pub fn register(
        &mut self,
        service: impl Into<String>,
        operation: impl Into<String>,
        limiter: Arc<dyn RateLimiter>,
    ) {
        self.overrides
            .insert((service.into(), operation.into()), limiter);
    }

    fn lookup(&self, key: Option<&CallKey>) -> &Arc<dyn RateLimiter> {
        let Some(key) = key else {
            return &self.default;
        };
        let candidates = [
            (key.service.clone(), key.operation.clone()),
            (key.service.clone(), String::new()),
            (String::new(), key.operation.clone()),
        ];
        for candidate in &candidates {
            if candidate.0.is_empty() && candidate.1.is_empty() {
                continue;
            }
            if let Some(limiter) = self.overrides.get(candidate) {
                return limiter;
            }
        }
        &self.default
    }
}

#[async_trait]
impl RateLimiter for CompositeRateLimiter {
    async fn accept(&self, ctx: &CallContext, key: Option<&CallKey>) -> Result<()> {
        self.lookup(key).accept(ctx, key).await
    }

    async fn observe(&self, ctx: &CallContext, error: Option<&CloudError>, key: Option<&CallKey>) {
        self.lookup(key).observe(ctx, error, key).await;
    }
}

/// Factory producing the inner limiter for a newly-seen project.
pub type RateLimiterFactory = Box<dyn Fn() -> Arc<dyn RateLimiter> + Send + Sync>;

/// A factory handing every project the same shared limiter, so all projects
/// draw from one quota.
pub fn shared_factory(limiter: Arc<dyn RateLimiter>) -> RateLimiterFactory {
    Box::new(move || limiter.clone())
}

/// Maintains one inner limiter per project, created on first sighting.
///
/// An absent or empty project id is canonicalized to a single shared
/// bucket.
pub struct PerProjectRateLimiter {
    factory: RateLimiterFactory,
    per_project: Mutex<HashMap<String, Arc<dyn RateLimiter>>>,
}

impl PerProjectRateLimiter {
    /// Create a per-project limiter with the given factory.
    pub fn new(factory: RateLimiterFactory) -> Self {
        Self {
            factory,
            per_project: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for(&self, key: Option<&CallKey>) -> Arc<dyn RateLimiter> {
        let project = key.map(|k| k.project.as_str()).unwrap_or("");
        let mut per_project = self.per_project.lock().await;
        if let Some(existing) = per_project.get(project) {
            return existing.clone();
        }
        debug!(project = %project, "creating rate limiter for project");
        let created = (self.factory)();
        per_project.insert(project.to_string(), created.clone());
        created
    }
}

#[async_trait]
impl RateLimiter for PerProjectRateLimiter {
    async fn accept(&self, ctx: &CallContext, key: Option<&CallKey>) -> Result<()> {
        self.limiter_for(key).await.accept(ctx, key).await
    }

    async fn observe(&self, ctx: &CallContext, error: Option<&CloudError>, key: Option<&CallKey>) {
        self.limiter_for(key).await.observe(ctx, error, key).await;
    }
}

/// A limiter that admits everything immediately.
///
/// Useful as a composite default in tests and for unconstrained projects.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopRateLimiter;

#[async_trait]
impl RateLimiter for NopRateLimiter {
    async fn accept(&self, ctx: &CallContext, _key: Option<&CallKey>) -> Result<()> {
        ctx.ensure_live()
    }
}
