//! Path tokens.

use crate::tags::Tag;
use std::fmt;

/// One path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A map key. An empty name stands in for a null token.
    Object(String),
    /// An array index.
    Array(usize),
    /// A tag qualifier; not navigable, used to scope a lookup.
    Tag(Tag),
}

impl Token {
    pub fn object(name: impl Into<String>) -> Self {
        Token::Object(name.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Token::Object(name) if name.is_empty())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Object(name) => write!(f, "{}", name),
            Token::Array(index) => write!(f, "[{}]", index),
            Token::Tag(tag) => write!(f, "@{}", tag),
        }
    }
}
