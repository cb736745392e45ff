//! Error types for the exec crate.

use thiserror::Error;

use converge_cloud::CloudError;
use converge_resource::ResourceId;

/// Result type alias for exec operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Execution error types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The action DAG contains a dependency cycle.
    #[error("cycle detected among actions: {actions:?}")]
    CycleDetected { actions: Vec<String> },

    /// An awaited event has no emitter in the action set.
    #[error("action '{action}' awaits '{event}' which no action emits")]
    MissingEvent { action: String, event: String },

    /// A cloud call made by an action failed.
    #[error("action '{action}' on {id} failed: {source}")]
    Action {
        action: String,
        id: ResourceId,
        source: CloudError,
    },

    /// An action's task panicked.
    #[error("action '{action}' panicked")]
    Panicked { action: String },

    /// Execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,
}

impl Error {
    /// Create a cycle error.
    pub fn cycle_detected(actions: Vec<String>) -> Self {
        Self::CycleDetected { actions }
    }

    /// Create a missing event error.
    pub fn missing_event(action: impl Into<String>, event: impl ToString) -> Self {
        Self::MissingEvent {
            action: action.into(),
            event: event.to_string(),
        }
    }

    /// Create an action failure carrying its origin.
    pub fn action(action: impl Into<String>, id: ResourceId, source: CloudError) -> Self {
        Self::Action {
            action: action.into(),
            id,
            source,
        }
    }

    /// Create a panicked-task error.
    pub fn panicked(action: impl Into<String>) -> Self {
        Self::Panicked {
            action: action.into(),
        }
    }

    /// Whether this error is a propagated cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Action { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// The underlying cloud error, if any.
    #[must_use]
    pub fn as_cloud(&self) -> Option<&CloudError> {
        match self {
            Self::Action { source, .. } => Some(source),
            _ => None,
        }
    }
}
