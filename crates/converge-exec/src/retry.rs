//! Retry decoration for actions.
//!
//! [`RetriableAction`] reruns a failing action while the policy allows it
//! and the context is live. It adds no backoff of its own; pacing comes
//! from composing the cloud facade with rate limiters.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use converge_cloud::{CallContext, Cloud};

use crate::action::{Action, ActionMetadata};
use crate::error::{Error, Result};
use crate::event::{Event, EventList};

/// Decides whether a failed action should be rerun.
pub trait RetryProvider: Send + Sync {
    /// Whether `error` is worth another attempt.
    fn is_retriable(&self, error: &Error) -> bool;
}

/// Retries transient and server-side cloud errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloudRetryProvider;

impl RetryProvider for CloudRetryProvider {
    fn is_retriable(&self, error: &Error) -> bool {
        error.as_cloud().is_some_and(|cloud| cloud.is_retriable())
    }
}

/// Decorates an action with rerun-on-error behavior.
///
/// The wrapped action's identity (metadata, awaited and emitted events)
/// is preserved; only the display form notes the decoration. Cancellation
/// stops retrying immediately and surfaces the last observed error
/// unwrapped.
pub struct RetriableAction {
    inner: Arc<dyn Action>,
    retry: Arc<dyn RetryProvider>,
}

impl RetriableAction {
    /// Wrap `inner` with the given retry policy.
    #[must_use]
    pub fn new(inner: Arc<dyn Action>, retry: Arc<dyn RetryProvider>) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl Action for RetriableAction {
    fn metadata(&self) -> &ActionMetadata {
        self.inner.metadata()
    }

    fn wants(&self) -> &[Event] {
        self.inner.wants()
    }

    fn events(&self) -> &[Event] {
        self.inner.events()
    }

    async fn run(&self, ctx: &CallContext, cloud: &Cloud) -> Result<EventList> {
        let mut attempt = 1u32;
        loop {
            match self.inner.run(ctx, cloud).await {
                Ok(events) => return Ok(events),
                Err(err) => {
                    if err.is_cancelled() || ctx.is_cancelled() {
                        return Err(err);
                    }
                    if !self.retry.is_retriable(&err) {
                        return Err(err);
                    }
                    debug!(
                        action = %self.inner.describe(),
                        attempt = attempt,
                        error = %err,
                        "retrying action"
                    );
                    attempt += 1;
                }
            }
        }
    }

    fn dry_run(&self) -> EventList {
        self.inner.dry_run()
    }

    fn describe(&self) -> String {
        format!("{} with retry", self.inner.describe())
    }
}
