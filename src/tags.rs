//! Tag sets identifying configuration overlays.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One `dimension=value` pair, e.g. `env=dev`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub dimension: String,
    pub value: String,
}

impl Tag {
    pub fn new(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            dimension: dimension.into(),
            value: value.into(),
        }
    }

    pub fn env(value: impl Into<String>) -> Self {
        Self::new("env", value)
    }

    pub fn profile(value: impl Into<String>) -> Self {
        Self::new("profile", value)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.dimension, self.value)
    }
}

/// An unordered set of tags. The empty set is the default overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tags(BTreeSet<Tag>);

impl Tags {
    /// The default overlay.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(tags: impl IntoIterator<Item = Tag>) -> Self {
        Self(tags.into_iter().collect())
    }

    /// Convenience for the common single-environment overlay.
    pub fn environment(value: impl Into<String>) -> Self {
        Self::of([Tag::env(value)])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    pub fn is_subset_of(&self, other: &Tags) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    /// A copy of this set with `tag` added.
    pub fn with(&self, tag: Tag) -> Tags {
        let mut tags = self.0.clone();
        tags.insert(tag);
        Tags(tags)
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(Tag::to_string).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl FromStr for Tags {
    type Err = ConfigError;

    /// Parse `env=dev,profile=booking`. An empty string is the default set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tags = BTreeSet::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (dimension, value) = part
                .split_once('=')
                .ok_or_else(|| ConfigError::settings("tags", format!("expected dimension=value, got '{}'", part)))?;
            let (dimension, value) = (dimension.trim(), value.trim());
            if dimension.is_empty() || value.is_empty() {
                return Err(ConfigError::settings(
                    "tags",
                    format!("empty dimension or value in '{}'", part),
                ));
            }
            tags.insert(Tag::new(dimension, value));
        }
        Ok(Tags(tags))
    }
}

impl FromIterator<Tag> for Tags {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self::of(iter)
    }
}
