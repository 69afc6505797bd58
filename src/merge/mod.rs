//! Merging configuration trees.
//!
//! Implements override merging where the incoming tree takes precedence over
//! the existing one:
//! - Maps are merged key by key, recursively
//! - Arrays are merged by position; holes left after alignment are reported
//! - Leaves take the incoming value, unless the incoming value is empty
//! - Mismatched node types are replaced by the incoming subtree
//!
//! Every function here returns a new tree and never touches its inputs.

pub mod manager;
pub mod validate;

pub use manager::{ConfigNodeContainer, ConfigNodeManager, ContainerId, OverlayTable};
pub use validate::{validate_node, validate_node_delimited};

use crate::error::ValidationError;
use crate::node::ConfigNode;
use crate::path::{join_index, join_key_with};
use crate::validated::Validated;
use indexmap::IndexMap;

/// Merge `incoming` over `existing`. The result always carries a tree.
pub fn merge_nodes(path: &str, existing: &ConfigNode, incoming: &ConfigNode) -> Validated<ConfigNode> {
    merge_nodes_delimited(path, '.', existing, incoming)
}

/// [`merge_nodes`] with diagnostic paths joined by `delimiter`.
pub fn merge_nodes_delimited(
    path: &str,
    delimiter: char,
    existing: &ConfigNode,
    incoming: &ConfigNode,
) -> Validated<ConfigNode> {
    let mut errors = Vec::new();
    let merged = merge_into(path, delimiter, existing, incoming, &mut errors);
    Validated::of(Some(merged), errors)
}

fn merge_into(
    path: &str,
    delimiter: char,
    existing: &ConfigNode,
    incoming: &ConfigNode,
    errors: &mut Vec<ValidationError>,
) -> ConfigNode {
    match (existing, incoming) {
        (
            ConfigNode::Map {
                children: existing_children,
                metadata: existing_meta,
            },
            ConfigNode::Map {
                children: incoming_children,
                metadata: incoming_meta,
            },
        ) => ConfigNode::Map {
            children: merge_maps(path, delimiter, existing_children, incoming_children, errors),
            metadata: existing_meta.merged_with(incoming_meta),
        },
        (
            ConfigNode::Array {
                elements: existing_elements,
                metadata: existing_meta,
            },
            ConfigNode::Array {
                elements: incoming_elements,
                metadata: incoming_meta,
            },
        ) => ConfigNode::Array {
            elements: merge_arrays(path, delimiter, existing_elements, incoming_elements, errors),
            metadata: existing_meta.merged_with(incoming_meta),
        },
        (
            ConfigNode::Leaf {
                value: existing_value,
                metadata: existing_meta,
            },
            ConfigNode::Leaf {
                value: incoming_value,
                metadata: incoming_meta,
            },
        ) => {
            let value = match incoming_value {
                Some(v) => Some(v.clone()),
                None => {
                    // Newer sources may override with something, never erase.
                    errors.push(ValidationError::empty_leaf_override(path));
                    existing_value.clone()
                }
            };
            ConfigNode::Leaf {
                value,
                metadata: existing_meta.merged_with(incoming_meta),
            }
        }
        (existing, incoming) => {
            errors.push(ValidationError::mismatched_merge(
                path,
                existing.node_type(),
                incoming.node_type(),
            ));
            incoming.clone()
        }
    }
}

fn merge_maps(
    path: &str,
    delimiter: char,
    existing: &IndexMap<String, Option<ConfigNode>>,
    incoming: &IndexMap<String, Option<ConfigNode>>,
    errors: &mut Vec<ValidationError>,
) -> IndexMap<String, Option<ConfigNode>> {
    let mut merged = IndexMap::with_capacity(existing.len().max(incoming.len()));

    for (key, existing_child) in existing {
        if key.is_empty() {
            errors.push(ValidationError::empty_node_name(path));
            continue;
        }
        let child_path = join_key_with(path, key, delimiter);
        let child = match (existing_child, incoming.get(key)) {
            (Some(e), Some(Some(n))) => Some(merge_into(&child_path, delimiter, e, n, errors)),
            (Some(e), Some(None)) => {
                errors.push(ValidationError::empty_node_value(&child_path));
                Some(e.clone())
            }
            (Some(e), None) => Some(e.clone()),
            (None, Some(Some(n))) => Some(n.clone()),
            (None, _) => None,
        };
        if let Some(child) = child {
            merged.insert(key.clone(), Some(child));
        }
    }

    for (key, incoming_child) in incoming {
        if existing.contains_key(key) {
            continue;
        }
        if key.is_empty() {
            errors.push(ValidationError::empty_node_name(path));
            continue;
        }
        if let Some(child) = incoming_child {
            merged.insert(key.clone(), Some(child.clone()));
        }
    }

    merged
}

fn merge_arrays(
    path: &str,
    delimiter: char,
    existing: &[Option<ConfigNode>],
    incoming: &[Option<ConfigNode>],
    errors: &mut Vec<ValidationError>,
) -> Vec<Option<ConfigNode>> {
    let len = existing.len().max(incoming.len());
    let mut merged = Vec::with_capacity(len);

    for index in 0..len {
        let e = existing.get(index).and_then(Option::as_ref);
        let n = incoming.get(index).and_then(Option::as_ref);
        let slot = match (e, n) {
            (Some(e), Some(n)) => Some(merge_into(&join_index(path, index), delimiter, e, n, errors)),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => {
                errors.push(ValidationError::missing_array_index(index, path));
                None
            }
        };
        merged.push(slot);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationLevel;
    use crate::node::{Metadata, MetadataKind};

    fn leaf(v: &str) -> ConfigNode {
        ConfigNode::leaf(v)
    }

    #[test]
    fn test_merge_disjoint_maps() {
        let a = ConfigNode::map([("db", ConfigNode::map([("port", leaf("100"))]))]);
        let b = ConfigNode::map([("db", ConfigNode::map([("name", leaf("x"))]))]);
        let result = merge_nodes("", &a, &b);
        assert!(!result.has_errors());
        let merged = result.into_value().unwrap();
        let db = merged.get_by_key("db").unwrap();
        assert_eq!(db.get_by_key("port").and_then(ConfigNode::value), Some("100"));
        assert_eq!(db.get_by_key("name").and_then(ConfigNode::value), Some("x"));
    }

    #[test]
    fn test_incoming_leaf_wins() {
        let a = ConfigNode::map([("port", leaf("100"))]);
        let b = ConfigNode::map([("port", leaf("200"))]);
        let merged = merge_nodes("", &a, &b).into_value().unwrap();
        assert_eq!(merged.get_by_key("port").and_then(ConfigNode::value), Some("200"));
    }

    #[test]
    fn test_empty_leaf_does_not_erase() {
        let a = ConfigNode::map([("port", leaf("100"))]);
        let b = ConfigNode::map([("port", ConfigNode::empty_leaf())]);
        let result = merge_nodes("", &a, &b);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].level, ValidationLevel::Warn);
        assert_eq!(
            result.errors()[0].description,
            "Unable to override value at path: port with an empty value, keeping the existing value"
        );
        let merged = result.into_value().unwrap();
        assert_eq!(merged.get_by_key("port").and_then(ConfigNode::value), Some("100"));
    }

    #[test]
    fn test_type_mismatch_incoming_replaces() {
        let a = ConfigNode::map([("db", ConfigNode::map([("port", leaf("1"))]))]);
        let b = ConfigNode::map([("db", leaf("sqlite"))]);
        let result = merge_nodes("", &a, &b);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].level, ValidationLevel::Error);
        assert_eq!(
            result.errors()[0].description,
            "Unable to merge different nodes, of type: map and type: leaf, for path: db"
        );
        let merged = result.into_value().unwrap();
        assert_eq!(merged.get_by_key("db").and_then(ConfigNode::value), Some("sqlite"));
    }

    #[test]
    fn test_array_merge_with_gap() {
        let a = ConfigNode::map([("admin", ConfigNode::array([leaf("a0"), leaf("a1")]))]);
        let b = ConfigNode::map([(
            "admin",
            ConfigNode::array_with_holes([Some(leaf("b0")), None, None, Some(leaf("b3"))]),
        )]);
        let result = merge_nodes("", &a, &b);
        let missing: Vec<_> = result
            .errors()
            .iter()
            .filter(|e| e.description.starts_with("Missing array index"))
            .collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].description, "Missing array index: 2 for path: admin");

        let merged = result.into_value().unwrap();
        let admin = merged.get_by_key("admin").unwrap();
        assert_eq!(admin.size(), 4);
        assert_eq!(admin.get_by_index(0).and_then(ConfigNode::value), Some("b0"));
        assert_eq!(admin.get_by_index(1).and_then(ConfigNode::value), Some("a1"));
        assert!(admin.get_by_index(2).is_none());
        assert_eq!(admin.get_by_index(3).and_then(ConfigNode::value), Some("b3"));
    }

    #[test]
    fn test_array_partial_object_override() {
        let a = ConfigNode::array([
            ConfigNode::map([("name", leaf("alice")), ("role", leaf("admin"))]),
            ConfigNode::map([("name", leaf("bob")), ("role", leaf("user"))]),
        ]);
        let b = ConfigNode::array_with_holes([None, Some(ConfigNode::map([("role", leaf("admin"))]))]);
        let result = merge_nodes("users", &a, &b);
        assert!(!result.has_errors());
        let merged = result.into_value().unwrap();
        let bob = merged.get_by_index(1).unwrap();
        assert_eq!(bob.get_by_key("name").and_then(ConfigNode::value), Some("bob"));
        assert_eq!(bob.get_by_key("role").and_then(ConfigNode::value), Some("admin"));
    }

    #[test]
    fn test_shorter_incoming_array_keeps_tail() {
        let a = ConfigNode::array([leaf("1"), leaf("2"), leaf("3")]);
        let b = ConfigNode::array([leaf("9")]);
        let merged = merge_nodes("", &a, &b).into_value().unwrap();
        assert_eq!(merged.size(), 3);
        assert_eq!(merged.get_by_index(0).and_then(ConfigNode::value), Some("9"));
        assert_eq!(merged.get_by_index(2).and_then(ConfigNode::value), Some("3"));
    }

    #[test]
    fn test_empty_key_is_skipped() {
        let a = ConfigNode::map([("a", leaf("1"))]);
        let b = ConfigNode::map([("", leaf("2")), ("b", leaf("3"))]);
        let result = merge_nodes("root", &a, &b);
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].description, "Empty node name provided for path: root");
        let merged = result.into_value().unwrap();
        assert_eq!(merged.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_keeps_existing_key_order() {
        let a = ConfigNode::map([("z", leaf("1")), ("a", leaf("2"))]);
        let b = ConfigNode::map([("m", leaf("3")), ("z", leaf("4"))]);
        let merged = merge_nodes("", &a, &b).into_value().unwrap();
        assert_eq!(merged.keys(), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_leaf_metadata_union() {
        let a = ConfigNode::leaf("p").with_metadata(Metadata::flag(MetadataKind::Secret, true));
        let b = ConfigNode::leaf("q").with_metadata(Metadata::flag(MetadataKind::NoCache, true));
        let merged = merge_nodes("pw", &a, &b).into_value().unwrap();
        assert_eq!(merged.node_metadata().bool_flag(&MetadataKind::Secret), Some(true));
        assert_eq!(merged.node_metadata().bool_flag(&MetadataKind::NoCache), Some(true));
    }

    #[test]
    fn test_inputs_are_untouched() {
        let a = ConfigNode::map([("port", leaf("1"))]);
        let b = ConfigNode::map([("port", leaf("2"))]);
        let before = a.clone();
        let _ = merge_nodes("", &a, &b);
        assert_eq!(a, before);
    }
}
