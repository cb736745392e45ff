//! Error types for the resource crate.

use thiserror::Error;

use crate::schema::ApiVersion;

/// Result type alias for resource operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Resource error types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A set field does not exist at the requested API version.
    #[error("field '{path}' is not available at version {version}")]
    IncompatibleVersion { path: String, version: ApiVersion },

    /// The payload belongs to a different collection than expected.
    #[error("wrong resource kind: expected '{expected}', got '{got}'")]
    WrongKind { expected: String, got: String },

    /// The payload violates a structural constraint.
    #[error("structural constraint violated: {reason}")]
    Structural { reason: String },

    /// Serialization to or from the structural projection failed.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// A self-link string could not be parsed back into an identity.
    #[error("malformed self-link '{link}': {reason}")]
    MalformedSelfLink { link: String, reason: String },
}

impl Error {
    /// Create an incompatible version error.
    pub fn incompatible_version(path: impl Into<String>, version: ApiVersion) -> Self {
        Self::IncompatibleVersion {
            path: path.into(),
            version,
        }
    }

    /// Create a wrong kind error.
    pub fn wrong_kind(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Self::WrongKind {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create a structural constraint error.
    pub fn structural(reason: impl Into<String>) -> Self {
        Self::Structural {
            reason: reason.into(),
        }
    }

    /// Create a serialization error.
    pub fn serialization(reason: impl Into<String>) -> Self {
        Self::Serialization {
            reason: reason.into(),
        }
    }

    /// Create a malformed self-link error.
    pub fn malformed_self_link(link: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSelfLink {
            link: link.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
