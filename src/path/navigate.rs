//! Walking a token sequence through a tree.

use super::token::Token;
use crate::error::ValidationError;
use crate::node::{ConfigNode, NodeType};
use crate::validated::Validated;

/// Follow a single token from `node`.
pub fn navigate_token<'a>(path: &str, node: &'a ConfigNode, token: &Token) -> Validated<&'a ConfigNode> {
    match token {
        Token::Object(name) if name.is_empty() => Validated::from_error(ValidationError::null_token(path)),
        Token::Object(name) => match node {
            ConfigNode::Map { .. } => match node.get_by_key(name) {
                Some(child) => Validated::ok(child),
                None => Validated::from_error(ValidationError::node_not_found(path, token)),
            },
            other => Validated::from_error(ValidationError::mismatched_node(
                path,
                NodeType::Map,
                other.node_type(),
            )),
        },
        Token::Array(index) => match node {
            ConfigNode::Array { .. } => match node.get_by_index(*index) {
                Some(child) => Validated::ok(child),
                None => Validated::from_error(ValidationError::node_not_found(path, token)),
            },
            other => Validated::from_error(ValidationError::mismatched_node(
                path,
                NodeType::Array,
                other.node_type(),
            )),
        },
        Token::Tag(_) => Validated::from_error(ValidationError::unsupported_token(path, token)),
    }
}

/// Follow `tokens` from `root`. An empty token list yields the root.
pub fn navigate<'a>(path: &str, root: &'a ConfigNode, tokens: &[Token]) -> Validated<&'a ConfigNode> {
    let mut current = root;
    for token in tokens {
        let (next, errors) = navigate_token(path, current, token).into_parts();
        match next {
            Some(node) => current = node,
            None => return Validated::from_errors(errors),
        }
    }
    Validated::ok(current)
}
