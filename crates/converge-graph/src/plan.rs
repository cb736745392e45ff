//! Per-node plans.

use std::fmt;

use serde::{Deserialize, Serialize};

use converge_resource::Diff;

/// What the engine intends to do with one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Desired and observed agree; nothing to do.
    Nothing,
    /// The resource is missing and will be created.
    Create,
    /// The resource will be replaced in place with the full desired payload.
    Update,
    /// An immutable field changed; the resource is deleted then created.
    Recreate,
    /// The resource is observed but no longer desired.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Nothing => "nothing",
            Self::Create => "create",
            Self::Update => "update",
            Self::Recreate => "recreate",
            Self::Delete => "delete",
        };
        f.write_str(text)
    }
}

/// A node's plan: the operation, why it was chosen, and the driving diff.
#[derive(Debug, Clone)]
pub struct Plan {
    /// The chosen operation.
    pub operation: Operation,
    /// Human-readable justification.
    pub why: String,
    /// The structural delta behind update/recreate decisions.
    pub diff: Option<Diff>,
}

impl Plan {
    /// A plan without a driving diff.
    #[must_use]
    pub fn new(operation: Operation, why: impl Into<String>) -> Self {
        Self {
            operation,
            why: why.into(),
            diff: None,
        }
    }

    /// Attach the diff that drove the decision.
    #[must_use]
    pub fn with_diff(mut self, diff: Diff) -> Self {
        self.diff = Some(diff);
        self
    }
}
