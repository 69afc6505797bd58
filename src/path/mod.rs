//! Path tokens, lexing, navigation and path mapping.

pub mod lexer;
pub mod mapper;
pub mod navigate;
pub mod token;

pub use lexer::{Lexer, PathLexer};
pub use mapper::{KebabCasePathMapper, PathMapper, SnakeCasePathMapper, StandardPathMapper};
pub use navigate::{navigate, navigate_token};
pub use token::Token;

/// `parent.key`, or just `key` at the root.
pub fn join_key(path: &str, key: &str) -> String {
    join_key_with(path, key, '.')
}

/// Like [`join_key`] with a configured delimiter, so message paths read the
/// way callers write them.
pub fn join_key_with(path: &str, key: &str, delimiter: char) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", path, delimiter, key)
    }
}

/// `parent[index]`.
pub fn join_index(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}
