//! Structural validation of an incoming tree before it is merged.

use crate::error::ValidationError;
use crate::node::ConfigNode;
use crate::path::{join_index, join_key_with};
use crate::validated::Validated;

/// Flag empty leaves, empty keys, null map values and array holes.
///
/// None of these stop the load. Entries with empty keys and null map values
/// are dropped from the returned tree; holes stay holes; empty leaves are
/// kept so a later merge can decide what to do with them.
pub fn validate_node(path: &str, node: &ConfigNode) -> Validated<ConfigNode> {
    validate_node_delimited(path, '.', node)
}

/// [`validate_node`] with diagnostic paths joined by `delimiter`.
pub fn validate_node_delimited(path: &str, delimiter: char, node: &ConfigNode) -> Validated<ConfigNode> {
    let mut errors = Vec::new();
    let cleaned = validate_into(path, delimiter, node, &mut errors);
    Validated::of(Some(cleaned), errors)
}

fn validate_into(path: &str, delimiter: char, node: &ConfigNode, errors: &mut Vec<ValidationError>) -> ConfigNode {
    match node {
        ConfigNode::Leaf { value, .. } => {
            if value.is_none() {
                errors.push(ValidationError::empty_leaf_value(path));
            }
            node.clone()
        }
        ConfigNode::Map { children, metadata } => {
            let mut cleaned = indexmap::IndexMap::with_capacity(children.len());
            for (key, child) in children {
                if key.is_empty() {
                    errors.push(ValidationError::empty_node_name(path));
                    continue;
                }
                let child_path = join_key_with(path, key, delimiter);
                match child {
                    Some(child) => {
                        cleaned.insert(key.clone(), Some(validate_into(&child_path, delimiter, child, errors)));
                    }
                    None => errors.push(ValidationError::empty_node_value(&child_path)),
                }
            }
            ConfigNode::Map {
                children: cleaned,
                metadata: metadata.clone(),
            }
        }
        ConfigNode::Array { elements, metadata } => {
            let cleaned = elements
                .iter()
                .enumerate()
                .map(|(index, element)| match element {
                    Some(element) => Some(validate_into(&join_index(path, index), delimiter, element, errors)),
                    None => {
                        errors.push(ValidationError::empty_array_slot(path, index));
                        None
                    }
                })
                .collect();
            ConfigNode::Array {
                elements: cleaned,
                metadata: metadata.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions(result: &Validated<ConfigNode>) -> Vec<String> {
        result.errors().iter().map(|e| e.description.clone()).collect()
    }

    #[test]
    fn test_clean_tree_has_no_errors() {
        let node = ConfigNode::map([("a", ConfigNode::array([ConfigNode::leaf("1")]))]);
        let result = validate_node("", &node);
        assert!(!result.has_errors());
        assert_eq!(result.into_value(), Some(node));
    }

    #[test]
    fn test_reports_every_problem_at_full_path() {
        let node = ConfigNode::map_with_nulls([
            ("", Some(ConfigNode::leaf("lost"))),
            ("nothing", None),
            (
                "db",
                Some(ConfigNode::map([
                    ("password", ConfigNode::empty_leaf()),
                    (
                        "hosts",
                        ConfigNode::array_with_holes([Some(ConfigNode::leaf("h")), None]),
                    ),
                ])),
            ),
        ]);
        let result = validate_node("", &node);
        assert_eq!(
            descriptions(&result),
            vec![
                "Empty node name provided for path: ".to_string(),
                "Empty node value provided for path: nothing".to_string(),
                "Empty leaf value provided for path: db.password".to_string(),
                "Empty array slot provided for path: db.hosts[1]".to_string(),
            ]
        );

        let cleaned = result.into_value().unwrap();
        assert_eq!(cleaned.keys(), vec!["db"]);
        let db = cleaned.get_by_key("db").unwrap();
        assert!(db.get_by_key("password").is_some());
        assert_eq!(db.get_by_key("hosts").unwrap().size(), 2);
    }
}
