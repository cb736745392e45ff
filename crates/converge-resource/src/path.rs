//! Structural field paths.
//!
//! A [`Path`] addresses a field inside a resource's structural projection,
//! e.g. `backends[0].group`. Paths key diff deltas and are matched against
//! the index-free patterns in schema metadata.

use std::fmt;

use crate::error::{Error, Result};

/// One step of a structural path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElem {
    /// Named object field.
    Field(String),
    /// Array index.
    Index(usize),
}

/// A structural field path such as `backends[0].group`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path(Vec<PathElem>);

impl Path {
    /// The empty path addressing the resource root.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Extend the path with a named field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.0.push(PathElem::Field(name.into()));
        self
    }

    /// Extend the path with an array index.
    #[must_use]
    pub fn index(mut self, index: usize) -> Self {
        self.0.push(PathElem::Index(index));
        self
    }

    /// Parse a rendered path like `backends[0].group`.
    pub fn parse(input: &str) -> Result<Self> {
        let mut path = Self::root();
        if input.is_empty() {
            return Ok(path);
        }
        for segment in input.split('.') {
            let (name, rest) = match segment.find('[') {
                Some(pos) => segment.split_at(pos),
                None => (segment, ""),
            };
            if name.is_empty() {
                return Err(Error::structural(format!("empty field name in '{input}'")));
            }
            path = path.field(name);
            let mut rest = rest;
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped
                    .find(']')
                    .ok_or_else(|| Error::structural(format!("unclosed index in '{input}'")))?;
                let index = stripped[..end]
                    .parse::<usize>()
                    .map_err(|_| Error::structural(format!("bad index in '{input}'")))?;
                path = path.index(index);
                rest = &stripped[end + 1..];
            }
            if !rest.is_empty() {
                return Err(Error::structural(format!(
                    "trailing characters after index in '{input}'"
                )));
            }
        }
        Ok(path)
    }

    /// The path's elements.
    #[must_use]
    pub fn elements(&self) -> &[PathElem] {
        &self.0
    }

    /// Whether this is the root path.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Match against an index-free dot-separated pattern.
    ///
    /// Index elements of the concrete path are skipped, so the pattern
    /// `backends.group` matches `backends[3].group`. The match is exact on
    /// the full field sequence, not a prefix.
    #[must_use]
    pub fn matches_pattern(&self, pattern: &str) -> bool {
        let fields = self.0.iter().filter_map(|elem| match elem {
            PathElem::Field(name) => Some(name.as_str()),
            PathElem::Index(_) => None,
        });
        let mut expected = pattern.split('.');
        for field in fields {
            match expected.next() {
                Some(want) if want == field => {}
                _ => return false,
            }
        }
        expected.next().is_none()
    }

    /// Whether `prefix` is a (field-wise) prefix of this path.
    #[must_use]
    pub fn starts_with_pattern(&self, prefix: &str) -> bool {
        let mut fields = self.0.iter().filter_map(|elem| match elem {
            PathElem::Field(name) => Some(name.as_str()),
            PathElem::Index(_) => None,
        });
        prefix.split('.').all(|want| fields.next() == Some(want))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, elem) in self.0.iter().enumerate() {
            match elem {
                PathElem::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathElem::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
