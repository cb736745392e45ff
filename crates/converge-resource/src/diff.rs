//! Structural diffing of frozen resources.
//!
//! Both sides are normalized first: server-assigned fields are dropped, and
//! zero values are treated as unset unless the schema grants them explicit
//! zero semantics. The result is a list of path-keyed deltas.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::path::Path;
use crate::resource::Frozen;
use crate::schema::{is_zero_value, SchemaMetadata};

/// A single field delta.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffItem {
    /// Path of the differing field.
    pub path: Path,
    /// Observed value (`Null` when absent).
    pub got: Value,
    /// Desired value (`Null` when absent).
    pub want: Value,
}

impl fmt::Display for DiffItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.path, self.got, self.want)
    }
}

/// The full delta between an observed and a desired resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// Deltas in deterministic path order.
    pub items: Vec<DiffItem>,
}

impl Diff {
    /// Whether the two sides are structurally equal.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Paths of the deltas matching any of the given index-free patterns.
    #[must_use]
    pub fn matching_paths(&self, patterns: &[&str]) -> Vec<&Path> {
        self.items
            .iter()
            .map(|item| &item.path)
            .filter(|path| patterns.iter().any(|p| path.matches_pattern(p)))
            .collect()
    }
}

/// Compute the structural delta from `got` (observed) to `want` (desired).
///
/// Fails with [`Error::WrongKind`] when the two resources belong to
/// different collections.
pub fn diff(got: &Frozen, want: &Frozen) -> Result<Diff> {
    if got.id().collection != want.id().collection {
        return Err(Error::wrong_kind(
            want.id().collection.clone(),
            got.id().collection.clone(),
        ));
    }
    let meta = want.metadata();
    let a = normalize(got.value(), meta, Path::root());
    let b = normalize(want.value(), meta, Path::root());
    let mut items = Vec::new();
    walk(Path::root(), &a, &b, &mut items);
    Ok(Diff { items })
}

/// Drop server-assigned fields and unset-equivalent zero values.
fn normalize(value: &Value, meta: &'static SchemaMetadata, at: Path) -> Value {
    match value {
        Value::Object(fields) => {
            let mut out = Map::new();
            for (key, inner) in fields {
                let path = at.clone().field(key.clone());
                if meta.is_output_only(&path) {
                    continue;
                }
                let normalized = normalize(inner, meta, path.clone());
                if is_zero_value(&normalized) && !meta.allows_zero(&path) {
                    continue;
                }
                out.insert(key.clone(), normalized);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, inner)| normalize(inner, meta, at.clone().index(i)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Recursively compare two normalized values, collecting leaf deltas.
fn walk(at: Path, got: &Value, want: &Value, out: &mut Vec<DiffItem>) {
    match (got, want) {
        (Value::Object(a), Value::Object(b)) => {
            let mut keys: Vec<&String> = a.keys().chain(b.keys()).collect();
            keys.sort();
            keys.dedup();
            for key in keys {
                let left = a.get(key).unwrap_or(&Value::Null);
                let right = b.get(key).unwrap_or(&Value::Null);
                walk(at.clone().field(key.clone()), left, right, out);
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            for i in 0..a.len().max(b.len()) {
                let left = a.get(i).unwrap_or(&Value::Null);
                let right = b.get(i).unwrap_or(&Value::Null);
                walk(at.clone().index(i), left, right, out);
            }
        }
        (a, b) => {
            if a != b {
                out.push(DiffItem {
                    path: at,
                    got: a.clone(),
                    want: b.clone(),
                });
            }
        }
    }
}
