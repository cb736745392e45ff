//! Resource identity, versioned values and structural diffing.
//!
//! This crate is the data-model foundation of the converge engine:
//!
//! - **Identity**: [`ResourceId`] and [`Scope`], with canonical self-links.
//! - **Paths**: structural field paths used as diff keys and metadata
//!   patterns.
//! - **Schemas**: per-collection field semantics (server-assigned, explicit
//!   zero, immutable, versioned availability).
//! - **Resources**: typed [`MutableResource`] values frozen into the
//!   type-erased [`Frozen`] form that graphs and actions consume.
//! - **Diffing**: normalized structural deltas between observed and desired
//!   state.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod diff;
pub mod error;
pub mod id;
pub mod path;
pub mod resource;
pub mod schema;

pub use diff::{diff, Diff, DiffItem};
pub use error::{Error, Result};
pub use id::{ResourceId, Scope};
pub use path::{Path, PathElem};
pub use resource::{Frozen, MutableResource};
pub use schema::{is_zero_value, ApiVersion, Schema, SchemaMetadata};
