//! Error types for the cloud facade.

use thiserror::Error;

/// Result type alias for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;

/// Cloud call error types.
#[derive(Debug, Clone, Error)]
pub enum CloudError {
    /// The resource does not exist.
    #[error("resource {id} not found")]
    NotFound { id: String },

    /// An insert collided with an existing resource.
    #[error("resource {id} already exists")]
    AlreadyExists { id: String },

    /// A call was routed through an accessor of the wrong scope.
    #[error("resource {id} is not {expected}-scoped")]
    ScopeMismatch { id: String, expected: String },

    /// A transient transport failure worth retrying.
    #[error("transient cloud error: {reason}")]
    Transient { reason: String },

    /// A server-side failure worth retrying.
    #[error("cloud server error {code}: {reason}")]
    Server { code: u16, reason: String },

    /// The call's context was cancelled.
    #[error("call cancelled")]
    Cancelled,

    /// The payload could not be encoded or decoded.
    #[error(transparent)]
    Resource(#[from] converge_resource::Error),
}

impl CloudError {
    /// Create a not-found error.
    pub fn not_found(id: impl ToString) -> Self {
        Self::NotFound {
            id: id.to_string(),
        }
    }

    /// Create an already-exists error.
    pub fn already_exists(id: impl ToString) -> Self {
        Self::AlreadyExists {
            id: id.to_string(),
        }
    }

    /// Create a scope mismatch error.
    pub fn scope_mismatch(id: impl ToString, expected: impl Into<String>) -> Self {
        Self::ScopeMismatch {
            id: id.to_string(),
            expected: expected.into(),
        }
    }

    /// Create a transient error.
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    /// Create a server error.
    pub fn server(code: u16, reason: impl Into<String>) -> Self {
        Self::Server {
            code,
            reason: reason.into(),
        }
    }

    /// Whether the call vanished because the resource does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a retry of the same call could succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Server { .. })
    }

    /// Whether the error is a propagated cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_classification() {
        assert!(CloudError::transient("connection reset").is_retriable());
        assert!(CloudError::server(503, "backend unavailable").is_retriable());
        assert!(!CloudError::not_found("hc1").is_retriable());
        assert!(!CloudError::Cancelled.is_retriable());
    }

    #[test]
    fn test_cancelled_is_not_conflated() {
        assert!(CloudError::Cancelled.is_cancelled());
        assert!(!CloudError::transient("x").is_cancelled());
    }
}
