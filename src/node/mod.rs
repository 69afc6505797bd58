//! Configuration tree model.
//!
//! A [`ConfigNode`] is an immutable tagged union of `Leaf`, `Map` and
//! `Array`. Merging and validation always build new nodes; once a tree has
//! been published in an overlay table nothing mutates it.

pub mod metadata;

pub use metadata::{Metadata, MetadataKind, MetadataRollups, MetadataValue, RollupRule};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Variant discriminant of a [`ConfigNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Leaf,
    Map,
    Array,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Leaf => write!(f, "leaf"),
            NodeType::Map => write!(f, "map"),
            NodeType::Array => write!(f, "array"),
        }
    }
}

/// A node in a configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    /// `value: None` means explicitly empty, distinct from `Some("")`.
    Leaf {
        value: Option<String>,
        metadata: Metadata,
    },
    /// A `None` child is a null value under that key.
    Map {
        children: IndexMap<String, Option<ConfigNode>>,
        metadata: Metadata,
    },
    /// A `None` element is a hole.
    Array {
        elements: Vec<Option<ConfigNode>>,
        metadata: Metadata,
    },
}

impl ConfigNode {
    pub fn leaf(value: impl Into<String>) -> Self {
        ConfigNode::Leaf {
            value: Some(value.into()),
            metadata: Metadata::new(),
        }
    }

    /// A leaf that explicitly holds no value.
    pub fn empty_leaf() -> Self {
        ConfigNode::Leaf {
            value: None,
            metadata: Metadata::new(),
        }
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ConfigNode)>,
    {
        ConfigNode::Map {
            children: entries
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v)))
                .collect(),
            metadata: Metadata::new(),
        }
    }

    /// A map whose entries may carry null values.
    pub fn map_with_nulls<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Option<ConfigNode>)>,
    {
        ConfigNode::Map {
            children: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            metadata: Metadata::new(),
        }
    }

    pub fn array<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = ConfigNode>,
    {
        ConfigNode::Array {
            elements: elements.into_iter().map(Some).collect(),
            metadata: Metadata::new(),
        }
    }

    /// An array that may contain holes.
    pub fn array_with_holes<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = Option<ConfigNode>>,
    {
        ConfigNode::Array {
            elements: elements.into_iter().collect(),
            metadata: Metadata::new(),
        }
    }

    /// Replace this node's metadata. Used while a tree is being built.
    pub fn with_metadata(self, metadata: Metadata) -> Self {
        match self {
            ConfigNode::Leaf { value, .. } => ConfigNode::Leaf { value, metadata },
            ConfigNode::Map { children, .. } => ConfigNode::Map { children, metadata },
            ConfigNode::Array { elements, .. } => ConfigNode::Array { elements, metadata },
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            ConfigNode::Leaf { .. } => NodeType::Leaf,
            ConfigNode::Map { .. } => NodeType::Map,
            ConfigNode::Array { .. } => NodeType::Array,
        }
    }

    /// Child under `name`; `None` for non-maps, unknown keys and null values.
    pub fn get_by_key(&self, name: &str) -> Option<&ConfigNode> {
        match self {
            ConfigNode::Map { children, .. } => children.get(name).and_then(Option::as_ref),
            _ => None,
        }
    }

    /// Element at `index`; `None` for non-arrays, out-of-range and holes.
    pub fn get_by_index(&self, index: usize) -> Option<&ConfigNode> {
        match self {
            ConfigNode::Array { elements, .. } => elements.get(index).and_then(Option::as_ref),
            _ => None,
        }
    }

    /// The leaf value, if this is a leaf that holds one.
    pub fn value(&self) -> Option<&str> {
        match self {
            ConfigNode::Leaf { value, .. } => value.as_deref(),
            _ => None,
        }
    }

    /// 1 for a leaf, child count for a map, slot count (holes included) for
    /// an array.
    pub fn size(&self) -> usize {
        match self {
            ConfigNode::Leaf { .. } => 1,
            ConfigNode::Map { children, .. } => children.len(),
            ConfigNode::Array { elements, .. } => elements.len(),
        }
    }

    pub fn node_metadata(&self) -> &Metadata {
        match self {
            ConfigNode::Leaf { metadata, .. }
            | ConfigNode::Map { metadata, .. }
            | ConfigNode::Array { metadata, .. } => metadata,
        }
    }

    pub fn metadata(&self, kind: &MetadataKind) -> Option<&[MetadataValue]> {
        self.node_metadata().get(kind)
    }

    /// Own metadata plus whatever the rollup table lifts from the children.
    pub fn rolled_up_metadata(&self, rollups: &MetadataRollups) -> Metadata {
        let children: Vec<Option<Metadata>> = match self {
            ConfigNode::Leaf { metadata, .. } => return metadata.clone(),
            ConfigNode::Map { children, .. } => children
                .values()
                .map(|child| child.as_ref().map(|c| c.rolled_up_metadata(rollups)))
                .collect(),
            ConfigNode::Array { elements, .. } => elements
                .iter()
                .map(|child| child.as_ref().map(|c| c.rolled_up_metadata(rollups)))
                .collect(),
        };
        rollups.roll_up(self.node_metadata(), &children)
    }

    /// Map keys in insertion order; empty for other variants.
    pub fn keys(&self) -> Vec<&str> {
        match self {
            ConfigNode::Map { children, .. } => children.keys().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Render as JSON. Leaves become strings, empty leaves, null values and
    /// holes become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigNode::Leaf { value, .. } => match value {
                Some(v) => Value::String(v.clone()),
                None => Value::Null,
            },
            ConfigNode::Map { children, .. } => {
                let mut object = serde_json::Map::new();
                for (key, child) in children {
                    object.insert(
                        key.clone(),
                        child.as_ref().map(ConfigNode::to_json).unwrap_or(Value::Null),
                    );
                }
                Value::Object(object)
            }
            ConfigNode::Array { elements, .. } => Value::Array(
                elements
                    .iter()
                    .map(|e| e.as_ref().map(ConfigNode::to_json).unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}
