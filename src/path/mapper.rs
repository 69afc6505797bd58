//! Alternative spellings tried when a key is not found as written.

use super::token::Token;
use heck::{ToKebabCase, ToSnakeCase};

/// Rewrites object tokens into another naming convention.
pub trait PathMapper: Send + Sync {
    fn name(&self) -> &str;

    /// The rewritten tokens, or `None` when the mapping changes nothing.
    fn map(&self, tokens: &[Token]) -> Option<Vec<Token>>;
}

fn map_names(tokens: &[Token], f: impl Fn(&str) -> String) -> Option<Vec<Token>> {
    let mapped: Vec<Token> = tokens
        .iter()
        .map(|token| match token {
            Token::Object(name) if !name.is_empty() => Token::Object(f(name)),
            other => other.clone(),
        })
        .collect();
    (mapped != tokens).then_some(mapped)
}

/// Keys as written.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardPathMapper;

impl PathMapper for StandardPathMapper {
    fn name(&self) -> &str {
        "standard"
    }

    fn map(&self, tokens: &[Token]) -> Option<Vec<Token>> {
        Some(tokens.to_vec())
    }
}

/// `dbPort` → `db_port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnakeCasePathMapper;

impl PathMapper for SnakeCasePathMapper {
    fn name(&self) -> &str {
        "snake_case"
    }

    fn map(&self, tokens: &[Token]) -> Option<Vec<Token>> {
        map_names(tokens, |name| name.to_snake_case())
    }
}

/// `dbPort` → `db-port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KebabCasePathMapper;

impl PathMapper for KebabCasePathMapper {
    fn name(&self) -> &str {
        "kebab-case"
    }

    fn map(&self, tokens: &[Token]) -> Option<Vec<Token>> {
        map_names(tokens, |name| name.to_kebab_case())
    }
}
