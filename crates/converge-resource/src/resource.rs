//! Mutable and frozen resource values.
//!
//! Resources are built typed and mutable, then frozen into a type-erased
//! structural form before they enter a graph. A [`Frozen`] resource pins one
//! authoritative API version; reads at other versions are projections that
//! fail when a set field does not exist there.

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::id::ResourceId;
use crate::path::Path;
use crate::schema::{is_zero_value, ApiVersion, Schema, SchemaMetadata};

/// A typed resource under construction.
///
/// Mutations go through [`access`](MutableResource::access), which
/// re-validates structural constraints after every change. Freezing yields
/// the immutable form that graphs, planners and actions consume.
#[derive(Debug, Clone)]
pub struct MutableResource<T: Schema> {
    id: ResourceId,
    version: ApiVersion,
    value: T,
}

impl<T: Schema> MutableResource<T> {
    /// Create an empty resource pinned at the GA version.
    pub fn new(id: ResourceId) -> Result<Self> {
        Self::with_version(id, ApiVersion::Ga)
    }

    /// Create an empty resource pinned at the given authoritative version.
    pub fn with_version(id: ResourceId, version: ApiVersion) -> Result<Self> {
        let meta = T::metadata();
        if id.collection != meta.collection {
            return Err(Error::wrong_kind(meta.collection, id.collection));
        }
        Ok(Self {
            id,
            version,
            value: T::default(),
        })
    }

    /// The resource identity.
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// The authoritative API version.
    #[must_use]
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Read the typed value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Apply a scoped mutation.
    ///
    /// The mutation is validated before it is kept: the payload must remain
    /// a JSON object, its `name` must agree with the identity, and
    /// server-assigned fields must stay unset. A failed validation leaves
    /// the resource unchanged.
    pub fn access(&mut self, mutate: impl FnOnce(&mut T)) -> Result<()> {
        let mut next = self.value.clone();
        mutate(&mut next);
        validate_desired(&self.id, &project(&next)?, T::metadata(), self.version)?;
        self.value = next;
        Ok(())
    }

    /// Freeze into the immutable, type-erased form.
    pub fn freeze(self) -> Result<Frozen> {
        Frozen::of_desired(self.id, self.version, &self.value)
    }
}

/// An immutable resource value inside a built graph.
///
/// Holds the authoritative structural projection plus the schema metadata
/// needed to diff it. Equality is structural, which makes rebuilt graphs
/// comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct Frozen {
    id: ResourceId,
    version: ApiVersion,
    value: Value,
    meta: &'static SchemaMetadata,
}

impl Frozen {
    /// Freeze a typed desired value, enforcing desired-side constraints.
    pub fn of_desired<T: Schema>(id: ResourceId, version: ApiVersion, value: &T) -> Result<Self> {
        let meta = T::metadata();
        if id.collection != meta.collection {
            return Err(Error::wrong_kind(meta.collection, id.collection.clone()));
        }
        let mut projected = project(value)?;
        validate_desired(&id, &projected, meta, version)?;
        fill_name(&id, &mut projected);
        Ok(Self {
            id,
            version,
            value: Value::Object(projected),
            meta,
        })
    }

    /// Wrap an observed structural value as returned by the cloud.
    ///
    /// Observed payloads legitimately carry server-assigned fields, so only
    /// the shape and name are checked.
    pub fn of_observed(
        id: ResourceId,
        version: ApiVersion,
        value: Value,
        meta: &'static SchemaMetadata,
    ) -> Result<Self> {
        if id.collection != meta.collection {
            return Err(Error::wrong_kind(meta.collection, id.collection.clone()));
        }
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(Error::structural(format!(
                    "observed payload for {id} is not an object: {other}"
                )))
            }
        };
        if let Some(Value::String(name)) = fields.get("name") {
            if !name.is_empty() && *name != id.name {
                return Err(Error::structural(format!(
                    "observed payload name '{name}' does not match {id}"
                )));
            }
        }
        fill_name(&id, &mut fields);
        Ok(Self {
            id,
            version,
            value: Value::Object(fields),
            meta,
        })
    }

    /// The resource identity.
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// The authoritative API version.
    #[must_use]
    pub fn version(&self) -> ApiVersion {
        self.version
    }

    /// Schema metadata for this collection.
    #[must_use]
    pub fn metadata(&self) -> &'static SchemaMetadata {
        self.meta
    }

    /// The authoritative structural projection.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Canonical self-link at the authoritative version.
    #[must_use]
    pub fn self_link(&self) -> String {
        self.id.self_link(self.version)
    }

    /// Project the value at another API version.
    ///
    /// Fails with [`Error::IncompatibleVersion`] when a set (non-zero) field
    /// does not exist at `version`.
    pub fn to_version(&self, version: ApiVersion) -> Result<Value> {
        if version != self.version {
            let mut set_paths = Vec::new();
            collect_set_paths(&self.value, Path::root(), &mut set_paths);
            for path in &set_paths {
                if self.meta.min_version(path) > version {
                    return Err(Error::incompatible_version(path.to_string(), version));
                }
            }
        }
        Ok(self.value.clone())
    }

    /// Recover the typed payload.
    pub fn decode<T: Schema>(&self) -> Result<T> {
        let meta = T::metadata();
        if meta.collection != self.id.collection {
            return Err(Error::wrong_kind(meta.collection, self.id.collection.clone()));
        }
        Ok(serde_json::from_value(self.value.clone())?)
    }

    /// Rebuild with a patched structural value, revalidating the shape.
    ///
    /// This is the seam graph builders use to inject resolved self-links;
    /// it returns a new value rather than mutating in place.
    pub fn patched(&self, patch: impl FnOnce(&mut Map<String, Value>)) -> Result<Self> {
        let mut fields = match &self.value {
            Value::Object(fields) => fields.clone(),
            other => {
                return Err(Error::structural(format!(
                    "payload for {} is not an object: {other}",
                    self.id
                )))
            }
        };
        patch(&mut fields);
        fill_name(&self.id, &mut fields);
        Ok(Self {
            id: self.id.clone(),
            version: self.version,
            value: Value::Object(fields),
            meta: self.meta,
        })
    }
}

/// Serialize a typed payload into its structural object form.
fn project<T: Schema>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::structural(format!(
            "payload did not serialize to an object: {other}"
        ))),
    }
}

/// Desired-side structural constraints.
fn validate_desired(
    id: &ResourceId,
    fields: &Map<String, Value>,
    meta: &'static SchemaMetadata,
    version: ApiVersion,
) -> Result<()> {
    if let Some(Value::String(name)) = fields.get("name") {
        if !name.is_empty() && *name != id.name {
            return Err(Error::structural(format!(
                "payload name '{name}' does not match {id}"
            )));
        }
    }
    let mut set_paths = Vec::new();
    collect_set_paths(&Value::Object(fields.clone()), Path::root(), &mut set_paths);
    for path in &set_paths {
        if meta.is_output_only(path) {
            return Err(Error::structural(format!(
                "server-assigned field '{path}' set on desired {id}"
            )));
        }
        if meta.min_version(path) > version {
            return Err(Error::incompatible_version(path.to_string(), version));
        }
    }
    Ok(())
}

fn fill_name(id: &ResourceId, fields: &mut Map<String, Value>) {
    let missing = match fields.get("name") {
        Some(Value::String(name)) => name.is_empty(),
        Some(Value::Null) | None => true,
        Some(_) => false,
    };
    if missing {
        fields.insert("name".to_string(), Value::String(id.name.clone()));
    }
}

/// Collect the paths of every set (non-zero) leaf value.
fn collect_set_paths(value: &Value, at: Path, out: &mut Vec<Path>) {
    match value {
        Value::Object(fields) => {
            for (key, inner) in fields {
                if !is_zero_value(inner) {
                    collect_set_paths(inner, at.clone().field(key.clone()), out);
                }
            }
        }
        Value::Array(items) => {
            for (i, inner) in items.iter().enumerate() {
                if !is_zero_value(inner) {
                    collect_set_paths(inner, at.clone().index(i), out);
                }
            }
        }
        _ => out.push(at),
    }
}
