//! Resource graph, planner and action lowering for the converge engine.
//!
//! The crate ties the engine together:
//!
//! - **Nodes and graphs**: typed vertices with ownership, desired and
//!   observed payloads, and the references between them.
//! - **The builder**: logical references resolved to self-link slots, graph
//!   invariants enforced, deterministic frozen output.
//! - **The planner**: observed-state fetch through the rate-limited
//!   facade, the operation decision table, recreate propagation and
//!   dangling-reference detection.
//! - **Lowering**: each planned node becomes the create/update/delete/
//!   exists actions the executors run.

pub mod builder;
pub mod error;
pub mod graph;
pub mod node;
pub mod plan;
pub mod planner;

#[cfg(test)]
mod testutil;

pub use builder::{GraphBuilder, LogicalRef, NodeSpec};
pub use error::{Error, Result};
pub use graph::Graph;
pub use node::{Node, NodeState, Ownership, ResourceRef};
pub use plan::{Operation, Plan};
pub use planner::{plan, PlanResult, PlanRow};
