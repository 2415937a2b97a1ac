use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator between the space and key parts of a composite id.
pub const SEPARATOR: char = ':';

/// A parsed domain object id.
///
/// Composite ids take the form `space:key`. A bare `key` is resolved into the
/// caller's default space, in which case `defined_space` stays `None` so that
/// the id can be written back out exactly as it was given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    key: String,
    space: String,
    defined_space: Option<String>,
}

impl Identifier {
    /// Parse a raw id, splitting on the first separator.
    ///
    /// Never fails: an id without a separator is treated as a bare key in
    /// `default_space`.
    pub fn parse(raw: &str, default_space: &str) -> Self {
        match raw.split_once(SEPARATOR) {
            Some((space, key)) => Self {
                key: key.to_string(),
                space: space.to_string(),
                defined_space: Some(space.to_string()),
            },
            None => Self {
                key: raw.to_string(),
                space: default_space.to_string(),
                defined_space: None,
            },
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The space this id resolves to, falling back to the default space.
    pub fn space(&self) -> &str {
        &self.space
    }

    /// The space encoded in the raw id, if any.
    pub fn defined_space(&self) -> Option<&str> {
        self.defined_space.as_deref()
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.defined_space {
            Some(space) => write!(f, "{}{}{}", space, SEPARATOR, self.key),
            None => f.write_str(&self.key),
        }
    }
}

/// Parses and generates ids against a configured default space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierProvider {
    default_space: String,
}

impl IdentifierProvider {
    pub fn new(default_space: impl Into<String>) -> Self {
        Self {
            default_space: default_space.into(),
        }
    }

    pub fn default_space(&self) -> &str {
        &self.default_space
    }

    pub fn parse(&self, raw: &str) -> Identifier {
        Identifier::parse(raw, &self.default_space)
    }

    /// Generate a fresh id, prefixed with `space` when one is given.
    pub fn generate(&self, space: Option<&str>) -> String {
        let key = Uuid::new_v4().to_string();
        match space {
            Some(space) => format!("{}{}{}", space, SEPARATOR, key),
            None => key,
        }
    }
}
