//! Call keys for admission control.

use std::fmt;

/// Identifies a cloud call for rate-limiting decisions.
///
/// Empty components mean "unspecified" and fall through to coarser
/// rate-limit buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CallKey {
    /// Owning project, used by per-project limiters.
    pub project: String,
    /// Service (collection) the call targets, e.g. `"backendServices"`.
    pub service: String,
    /// Operation name, e.g. `"get"`.
    pub operation: String,
}

impl CallKey {
    /// Create a fully-specified call key.
    pub fn new(
        project: impl Into<String>,
        service: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            service: service.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.project, self.service, self.operation)
    }
}
