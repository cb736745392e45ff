//! Error types for the graph crate.

use thiserror::Error;

use converge_cloud::CloudError;
use converge_resource::ResourceId;

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Graph construction and planning error types.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Two node specs share one identity.
    #[error("duplicate node id {id}")]
    DuplicateId { id: ResourceId },

    /// A logical reference could not be resolved to a field and target.
    #[error("unresolved reference from {from} via '{field}': {reason}")]
    UnresolvedRef {
        from: ResourceId,
        field: String,
        reason: String,
    },

    /// A reference slot holds a different self-link than its target's.
    #[error("reference at {from}.{path} holds '{found}', expected '{expected}'")]
    RefPathMismatch {
        from: ResourceId,
        path: String,
        found: String,
        expected: String,
    },

    /// An external resource asserted by the graph is not observed.
    #[error("external resource {id} does not exist")]
    MissingExternal { id: ResourceId },

    /// A live node references a node planned for deletion.
    #[error("{from} references {to}, which is planned for deletion")]
    DanglingRef { from: ResourceId, to: ResourceId },

    /// A node's ownership was never decided.
    #[error("ownership of {id} is unknown; refusing to plan it")]
    UnknownOwnership { id: ResourceId },

    /// Fetching observed state failed with a non-NotFound error.
    #[error("observing {id} failed: {source}")]
    ObservationFailed { id: ResourceId, source: CloudError },

    /// A node reached lowering without a recorded plan.
    #[error("node {id} has no plan")]
    MissingPlan { id: ResourceId },

    /// A mutating plan found no desired payload to apply.
    #[error("node {id} has no desired payload to {operation}")]
    MissingDesired { id: ResourceId, operation: String },

    /// A resource-level failure.
    #[error(transparent)]
    Resource(#[from] converge_resource::Error),

    /// An action DAG failure during lowering.
    #[error(transparent)]
    Exec(#[from] converge_exec::Error),
}

impl Error {
    /// Create a duplicate id error.
    pub fn duplicate_id(id: ResourceId) -> Self {
        Self::DuplicateId { id }
    }

    /// Create an unresolved reference error.
    pub fn unresolved_ref(
        from: ResourceId,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnresolvedRef {
            from,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a reference mismatch error.
    pub fn ref_path_mismatch(
        from: ResourceId,
        path: impl ToString,
        found: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::RefPathMismatch {
            from,
            path: path.to_string(),
            found: found.into(),
            expected: expected.into(),
        }
    }

    /// Create a missing external error.
    pub fn missing_external(id: ResourceId) -> Self {
        Self::MissingExternal { id }
    }

    /// Create a dangling reference error.
    pub fn dangling_ref(from: ResourceId, to: ResourceId) -> Self {
        Self::DanglingRef { from, to }
    }

    /// Create an unknown ownership error.
    pub fn unknown_ownership(id: ResourceId) -> Self {
        Self::UnknownOwnership { id }
    }

    /// Create an observation failure.
    pub fn observation_failed(id: ResourceId, source: CloudError) -> Self {
        Self::ObservationFailed { id, source }
    }

    /// Create a missing plan error.
    pub fn missing_plan(id: ResourceId) -> Self {
        Self::MissingPlan { id }
    }

    /// Create a missing desired payload error.
    pub fn missing_desired(id: ResourceId, operation: impl ToString) -> Self {
        Self::MissingDesired {
            id,
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_resource() {
        let id = ResourceId::global("p", "healthChecks", "hc1");
        let err = Error::duplicate_id(id.clone());
        assert!(err.to_string().contains("hc1"));

        let err = Error::unresolved_ref(id, "healthChecks", "no such field");
        assert!(err.to_string().contains("no such field"));
    }
}
