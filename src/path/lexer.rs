//! Turning raw path segments into tokens.

use super::token::Token;
use crate::error::ValidationError;
use crate::validated::Validated;
use regex_lite::Regex;

/// Converts a path segment (`db`, `hosts[2]`, `[0][1]`) into tokens.
pub trait Lexer: Send + Sync {
    fn delimiter(&self) -> char;

    /// Scan one segment; `path` is only used in diagnostics.
    fn scan(&self, path: &str, segment: &str) -> Validated<Vec<Token>>;

    /// Split a full path into segments on the delimiter.
    fn segments<'a>(&self, path: &'a str) -> Vec<&'a str> {
        if path.is_empty() {
            return Vec::new();
        }
        path.split(self.delimiter()).collect()
    }

    /// Scan every segment of a full path.
    fn scan_path(&self, path: &str) -> Validated<Vec<Token>> {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for segment in self.segments(path) {
            let (scanned, scan_errors) = self.scan(path, segment).into_parts();
            errors.extend(scan_errors);
            match scanned {
                Some(t) => tokens.extend(t),
                None => return Validated::from_errors(errors),
            }
        }
        Validated::of(Some(tokens), errors)
    }
}

/// Default lexer: `name` optionally followed by `[index]` accessors.
#[derive(Debug, Clone)]
pub struct PathLexer {
    delimiter: char,
    segment: Regex,
    index: Regex,
}

impl PathLexer {
    pub fn new(delimiter: char) -> Self {
        Self {
            delimiter,
            segment: Regex::new(r"^(?P<name>[^\[\]]*)(?P<indices>(\[\d+\])*)$")
                .expect("segment pattern is valid"),
            index: Regex::new(r"\[(\d+)\]").expect("index pattern is valid"),
        }
    }
}

impl Default for PathLexer {
    fn default() -> Self {
        Self::new('.')
    }
}

impl Lexer for PathLexer {
    fn delimiter(&self) -> char {
        self.delimiter
    }

    fn scan(&self, path: &str, segment: &str) -> Validated<Vec<Token>> {
        let Some(caps) = self.segment.captures(segment) else {
            return Validated::from_error(ValidationError::unable_to_tokenize(path, segment));
        };

        let name = caps.name("name").map(|m| m.as_str()).unwrap_or_default();
        let indices = caps.name("indices").map(|m| m.as_str()).unwrap_or_default();

        let mut tokens = Vec::new();
        if !name.is_empty() || indices.is_empty() {
            tokens.push(Token::object(name));
        }
        for cap in self.index.captures_iter(indices) {
            match cap[1].parse::<usize>() {
                Ok(i) => tokens.push(Token::Array(i)),
                Err(_) => {
                    return Validated::from_error(ValidationError::unable_to_tokenize(path, segment));
                }
            }
        }
        Validated::ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(segment: &str) -> Option<Vec<Token>> {
        PathLexer::default().scan("p", segment).into_value()
    }

    #[test]
    fn test_plain_name() {
        assert_eq!(scan("db"), Some(vec![Token::object("db")]));
    }

    #[test]
    fn test_name_with_indices() {
        assert_eq!(
            scan("hosts[2][10]"),
            Some(vec![Token::object("hosts"), Token::Array(2), Token::Array(10)])
        );
    }

    #[test]
    fn test_bare_index() {
        assert_eq!(scan("[3]"), Some(vec![Token::Array(3)]));
    }

    #[test]
    fn test_empty_segment_is_null_token() {
        assert_eq!(scan(""), Some(vec![Token::object("")]));
    }

    #[test]
    fn test_malformed_segment() {
        let result = PathLexer::default().scan("a.b", "hosts[x]");
        assert!(!result.has_results());
        assert_eq!(
            result.errors()[0].description,
            "Unable to tokenize element: hosts[x] for path: a.b"
        );
        assert!(scan("hosts[1").is_none());
    }

    #[test]
    fn test_scan_path() {
        let lexer = PathLexer::default();
        let tokens = lexer.scan_path("servers[0].port").into_value().unwrap();
        assert_eq!(
            tokens,
            vec![Token::object("servers"), Token::Array(0), Token::object("port")]
        );
        assert_eq!(lexer.scan_path("").into_value(), Some(Vec::new()));
    }

    #[test]
    fn test_custom_delimiter() {
        let lexer = PathLexer::new('/');
        assert_eq!(lexer.segments("a/b.c"), vec!["a", "b.c"]);
    }
}
