//! Resource identity: project, scope, collection and name.
//!
//! A [`ResourceId`] is the stable identity of a cloud resource. Its
//! canonical string form is the self-link URL, which doubles as the
//! wire-level foreign key between resources.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::ApiVersion;

/// Base URL shared by every self-link.
const SELF_LINK_PREFIX: &str = "https://www.googleapis.com/compute";

/// Placement of a resource within the cloud's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    /// Project-wide.
    Global,
    /// Bound to a region.
    Regional(String),
    /// Bound to a zone.
    Zonal(String),
}

impl Scope {
    /// URL path fragment: `global`, `regions/{r}` or `zones/{z}`.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Regional(region) => format!("regions/{region}"),
            Self::Zonal(zone) => format!("zones/{zone}"),
        }
    }

    /// Whether this is the global scope.
    #[must_use]
    pub fn is_global(&self) -> bool {
        matches!(self, Self::Global)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Stable identity of a cloud resource.
///
/// Ordered lexicographically by `(project, scope, collection, name)`, which
/// gives graphs and plans a deterministic iteration order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceId {
    /// Owning project.
    pub project: String,
    /// Namespace partition.
    pub scope: Scope,
    /// Collection name as used in self-links, e.g. `"backendServices"`.
    pub collection: String,
    /// Resource name, unique within `(project, scope, collection)`.
    pub name: String,
}

impl ResourceId {
    /// A global resource id.
    pub fn global(
        project: impl Into<String>,
        collection: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            scope: Scope::Global,
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// A regional resource id.
    pub fn regional(
        project: impl Into<String>,
        region: impl Into<String>,
        collection: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            scope: Scope::Regional(region.into()),
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// A zonal resource id.
    pub fn zonal(
        project: impl Into<String>,
        zone: impl Into<String>,
        collection: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            scope: Scope::Zonal(zone.into()),
            collection: collection.into(),
            name: name.into(),
        }
    }

    /// Canonical self-link URL at the given API version.
    #[must_use]
    pub fn self_link(&self, version: ApiVersion) -> String {
        format!(
            "{SELF_LINK_PREFIX}/{}/projects/{}/{}/{}/{}",
            version.segment(),
            self.project,
            self.scope.path(),
            self.collection,
            self.name,
        )
    }

    /// Parse a self-link URL back into an identity and its version.
    pub fn parse_self_link(link: &str) -> Result<(Self, ApiVersion)> {
        let rest = link
            .strip_prefix(SELF_LINK_PREFIX)
            .and_then(|r| r.strip_prefix('/'))
            .ok_or_else(|| Error::malformed_self_link(link, "unexpected prefix"))?;

        let segments: Vec<&str> = rest.split('/').collect();
        let version = match segments.first() {
            Some(&"v1") => ApiVersion::Ga,
            Some(&"beta") => ApiVersion::Beta,
            Some(&"alpha") => ApiVersion::Alpha,
            _ => return Err(Error::malformed_self_link(link, "unknown version segment")),
        };

        match segments.as_slice() {
            [_, "projects", project, "global", collection, name] => Ok((
                Self::global(*project, *collection, *name),
                version,
            )),
            [_, "projects", project, "regions", region, collection, name] => Ok((
                Self::regional(*project, *region, *collection, *name),
                version,
            )),
            [_, "projects", project, "zones", zone, collection, name] => Ok((
                Self::zonal(*project, *zone, *collection, *name),
                version,
            )),
            _ => Err(Error::malformed_self_link(link, "unexpected path shape")),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}/{}",
            self.collection,
            self.project,
            self.scope.path(),
            self.name
        )
    }
}
