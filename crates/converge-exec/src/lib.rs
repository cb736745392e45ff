//! Event-ordered action execution for the converge engine.
//!
//! Plans lower into [`Action`]s connected by events: an action's success
//! signals the events downstream actions await. This crate owns:
//!
//! - **Events and actions**: the [`Event`] values, the [`Action`] trait and
//!   the generic create/update/delete/exists implementations.
//! - **The DAG**: event-edge construction with missing-emitter and cycle
//!   detection.
//! - **Executors**: a deterministic serial walk and a bounded-concurrency
//!   parallel dispatcher, both with dry-run and cancellation support.
//! - **Retry**: a decorator rerunning failed actions under a
//!   [`RetryProvider`] policy.

pub mod action;
pub mod actions;
pub mod dag;
pub mod error;
pub mod event;
pub mod executor;
pub mod retry;

#[cfg(test)]
mod testutil;

pub use action::{Action, ActionKind, ActionMetadata, ExistsAction};
pub use actions::{CreateAction, DeleteAction, UpdateAction};
pub use dag::ActionDag;
pub use error::{Error, Result};
pub use event::{Event, EventList};
pub use executor::{ExecutionResult, ExecutorConfig, ParallelExecutor, SerialExecutor};
pub use retry::{CloudRetryProvider, RetriableAction, RetryProvider};
