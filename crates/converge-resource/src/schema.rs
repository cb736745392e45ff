//! Schema metadata: API versions and per-field diff semantics.
//!
//! Every resource payload type carries a static [`SchemaMetadata`] describing
//! its collection name and how individual fields behave under diffing:
//! server-assigned fields are excluded, zero values are normally treated as
//! unset, and immutable fields force a delete-and-recreate instead of an
//! in-place update.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::path::Path;

/// Release channel of a cloud API surface.
///
/// Ordered by stability: `Ga < Beta < Alpha`. A field introduced at `Beta`
/// is visible at `Beta` and `Alpha` but not at `Ga`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum ApiVersion {
    /// Stable surface.
    #[default]
    Ga,
    /// Beta surface.
    Beta,
    /// Alpha surface.
    Alpha,
}

impl ApiVersion {
    /// URL path segment for this version.
    #[must_use]
    pub fn segment(&self) -> &'static str {
        match self {
            Self::Ga => "v1",
            Self::Beta => "beta",
            Self::Alpha => "alpha",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

/// Static description of a resource collection's field semantics.
///
/// Pattern strings are dot-separated camelCase field paths without indices
/// (`"backends.group"` matches `backends[3].group`).
#[derive(Debug, PartialEq)]
pub struct SchemaMetadata {
    /// Collection name as it appears in self-links, e.g. `"healthChecks"`.
    pub collection: &'static str,
    /// Server-assigned fields, excluded from diffs.
    pub output_only: &'static [&'static str],
    /// Fields where an explicit zero value is meaningful and diffed.
    pub allow_zero: &'static [&'static str],
    /// Fields whose change cannot be applied in place; any delta forces a
    /// recreate.
    pub immutable: &'static [&'static str],
    /// Fields that only exist at or above a given version. Unlisted fields
    /// are available everywhere.
    pub min_versions: &'static [(&'static str, ApiVersion)],
    /// Fields that hold self-links of other resources.
    pub refs: &'static [&'static str],
}

impl SchemaMetadata {
    /// Whether the path names a server-assigned field.
    #[must_use]
    pub fn is_output_only(&self, path: &Path) -> bool {
        self.output_only.iter().any(|p| path.matches_pattern(p))
    }

    /// Whether an explicit zero value at the path is meaningful.
    #[must_use]
    pub fn allows_zero(&self, path: &Path) -> bool {
        self.allow_zero.iter().any(|p| path.matches_pattern(p))
    }

    /// Whether a delta at the path forces a recreate.
    #[must_use]
    pub fn is_immutable(&self, path: &Path) -> bool {
        self.immutable.iter().any(|p| path.matches_pattern(p))
    }

    /// Earliest version at which the path exists.
    #[must_use]
    pub fn min_version(&self, path: &Path) -> ApiVersion {
        self.min_versions
            .iter()
            .find(|(p, _)| path.matches_pattern(p))
            .map(|(_, v)| *v)
            .unwrap_or(ApiVersion::Ga)
    }
}

/// A typed cloud resource payload.
///
/// The serialized form is the structural projection used for diffing,
/// version conversion and transport, so serde names must match the wire
/// format (camelCase).
pub trait Schema:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Send + Sync + 'static
{
    /// Field semantics for this collection.
    fn metadata() -> &'static SchemaMetadata;
}

/// Whether a JSON value is a zero value: null, `""`, `0`, `false`, `[]`
/// or `{}`.
#[must_use]
pub fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
