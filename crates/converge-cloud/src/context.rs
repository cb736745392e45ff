//! Cancellation context for cloud-facing waits.
//!
//! Every rate-limiter wait, wire call and retry loop receives a
//! [`CallContext`]; cancelling it makes all of them return promptly with
//! [`CloudError::Cancelled`].

use tokio_util::sync::CancellationToken;

use crate::error::{CloudError, Result};

/// Cancellation signal threaded through every cloud-facing suspension point.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
}

impl CallContext {
    /// A fresh, uncancelled context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    #[must_use]
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// A child context cancelled together with this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Cancel this context and all children.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the context has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once the context is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Error out immediately if the context is already cancelled.
    pub fn ensure_live(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(CloudError::Cancelled)
        } else {
            Ok(())
        }
    }
}
