//! Events linking actions into a DAG.
//!
//! An action's completion emits events; other actions name those events as
//! preconditions. Events are plain values; signaling the same event twice
//! is a no-op in the executor's event store.

use std::fmt;

use converge_resource::ResourceId;

/// A named completion signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    /// The resource exists (created, updated or verified).
    Exists(ResourceId),
    /// The resource no longer exists.
    DoesNotExist(ResourceId),
}

impl Event {
    /// The resource the event is about.
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        match self {
            Self::Exists(id) | Self::DoesNotExist(id) => id,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists(id) => write!(f, "exists({id})"),
            Self::DoesNotExist(id) => write!(f, "does-not-exist({id})"),
        }
    }
}

/// Events emitted by one action run.
pub type EventList = Vec<Event>;
