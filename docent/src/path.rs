//! Population path specifications.

use crate::{Error, Result};
use std::str::FromStr;

/// Which relation fields a populate call should resolve.
///
/// A shallow spec names one level of relation fields; a deep spec carries a
/// nested spec that is applied, recursively, to the entities resolved for
/// every named field.
///
/// ```
/// use docent::PathSpec;
///
/// // resolve `books` and `avatar`
/// let spec = PathSpec::parse("books avatar")?;
///
/// // resolve `books`, then each book's `author`, then each author's `books`
/// let spec = PathSpec::deep("books", PathSpec::deep("author", "books".parse()?)?)?;
/// # Ok::<(), docent::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSpec {
    /// One level of field names, no recursion.
    Shallow(Vec<String>),
    /// Field names plus a spec for the entities they resolve to.
    Deep {
        path: Vec<String>,
        nested: Box<PathSpec>,
    },
}

impl PathSpec {
    /// Parses a space-separated field list into a shallow spec.
    pub fn parse(path: &str) -> Result<Self> {
        Ok(Self::Shallow(split(path)?))
    }

    /// Builds a deep spec from a space-separated field list and a nested
    /// spec for the resolved entities.
    pub fn deep(path: &str, nested: PathSpec) -> Result<Self> {
        Ok(Self::Deep {
            path: split(path)?,
            nested: Box::new(nested),
        })
    }

    /// The relation fields named at this level.
    pub fn fields(&self) -> &[String] {
        match self {
            Self::Shallow(path) | Self::Deep { path, .. } => path,
        }
    }

    /// The nested spec, if this is a deep spec.
    pub fn nested(&self) -> Option<&PathSpec> {
        match self {
            Self::Shallow(_) => None,
            Self::Deep { nested, .. } => Some(nested),
        }
    }
}

impl FromStr for PathSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn split(path: &str) -> Result<Vec<String>> {
    let fields: Vec<String> = path.split_whitespace().map(str::to_owned).collect();
    if fields.is_empty() {
        return Err(Error::validation(
            "populate options are invalid: path is blank",
        ));
    }
    Ok(fields)
}
