//! Diagnostics and hard errors.
//!
//! Data-shape problems (missing keys, type mismatches, empty leaves, array
//! holes) are reported as [`ValidationError`] values and collected alongside
//! partial results. [`ConfigError`] is reserved for programming or
//! configuration mistakes that have to stop the current operation.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Severity of a diagnostic, most severe first.
///
/// The derived ordering follows declaration order, so `Error < Warn` and a
/// "at least as severe as" check is `level <= threshold`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationLevel {
    /// Blocks the value it is attached to, not the whole load.
    Error,
    /// A required value was not supplied.
    MissingValue,
    Warn,
    /// An optional or defaultable value was not supplied.
    MissingOptionalValue,
    Debug,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationLevel::Error => "ERROR",
            ValidationLevel::MissingValue => "MISSING_VALUE",
            ValidationLevel::Warn => "WARN",
            ValidationLevel::MissingOptionalValue => "MISSING_OPTIONAL_VALUE",
            ValidationLevel::Debug => "DEBUG",
        }
    }

    /// Parse a level name as written in settings files.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "error" => Some(ValidationLevel::Error),
            "missing_value" => Some(ValidationLevel::MissingValue),
            "warn" | "warning" => Some(ValidationLevel::Warn),
            "missing_optional_value" => Some(ValidationLevel::MissingOptionalValue),
            "debug" => Some(ValidationLevel::Debug),
            _ => None,
        }
    }

    /// Whether this level should fail a top-level request.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ValidationLevel::Error | ValidationLevel::MissingValue)
    }
}

impl fmt::Display for ValidationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A leveled, non-fatal diagnostic.
///
/// The description strings are part of the observable contract, so every
/// template lives in a constructor below.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ValidationError {
    pub level: ValidationLevel,
    pub description: String,
}

impl ValidationError {
    pub fn new(level: ValidationLevel, description: impl Into<String>) -> Self {
        Self {
            level,
            description: description.into(),
        }
    }

    /// Return the same diagnostic at a different level.
    pub fn with_level(mut self, level: ValidationLevel) -> Self {
        self.level = level;
        self
    }

    // Structural validation

    pub fn empty_leaf_value(path: &str) -> Self {
        Self::new(
            ValidationLevel::Warn,
            format!("Empty leaf value provided for path: {}", path),
        )
    }

    pub fn empty_node_name(path: &str) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("Empty node name provided for path: {}", path),
        )
    }

    pub fn empty_array_slot(path: &str, index: usize) -> Self {
        Self::new(
            ValidationLevel::Warn,
            format!("Empty array slot provided for path: {}[{}]", path, index),
        )
    }

    pub fn empty_node_value(path: &str) -> Self {
        Self::new(
            ValidationLevel::Warn,
            format!("Empty node value provided for path: {}", path),
        )
    }

    // Merging

    pub fn missing_array_index(index: usize, path: &str) -> Self {
        Self::new(
            ValidationLevel::MissingValue,
            format!("Missing array index: {} for path: {}", index, path),
        )
    }

    pub fn empty_leaf_override(path: &str) -> Self {
        Self::new(
            ValidationLevel::Warn,
            format!(
                "Unable to override value at path: {} with an empty value, keeping the existing value",
                path
            ),
        )
    }

    pub fn mismatched_merge(path: &str, existing: impl fmt::Display, incoming: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!(
                "Unable to merge different nodes, of type: {} and type: {}, for path: {}",
                existing, incoming, path
            ),
        )
    }

    pub fn no_roots_for_tags(tags: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::MissingValue,
            format!("No configuration roots found for tags: [{}]", tags),
        )
    }

    // Navigation

    pub fn mismatched_node(path: &str, expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!(
                "Mismatched node type for path: {}, expected: {}, received: {}",
                path, expected, actual
            ),
        )
    }

    pub fn node_not_found(path: &str, token: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::MissingValue,
            format!("Unable to find node matching path: {}, for token: {}", path, token),
        )
    }

    pub fn null_token(path: &str) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("Null or empty token provided for path: {}", path),
        )
    }

    pub fn unsupported_token(path: &str, token: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("Unsupported token: {} for path: {}", token, path),
        )
    }

    pub fn unable_to_tokenize(path: &str, segment: &str) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("Unable to tokenize element: {} for path: {}", segment, path),
        )
    }

    // Decoding

    pub fn no_decoders_found(type_name: &str) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("No decoders found for class: {}", type_name),
        )
    }

    pub fn missing_value(path: &str) -> Self {
        Self::new(
            ValidationLevel::MissingValue,
            format!("Unable to find node matching path: {}", path),
        )
    }

    pub fn missing_optional_value(path: &str, type_name: &str) -> Self {
        Self::new(
            ValidationLevel::MissingOptionalValue,
            format!(
                "Missing optional value on path: {}, using an empty {}",
                path, type_name
            ),
        )
    }

    pub fn leaf_missing_value(path: &str, type_name: &str) -> Self {
        Self::new(
            ValidationLevel::MissingValue,
            format!(
                "Leaf on path: {}, has no value attempting to decode {}",
                path, type_name
            ),
        )
    }

    pub fn parse_failure(path: &str, type_name: &str, value: &str) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!(
                "Unable to parse a {} on path: {}, from value: {}",
                type_name, path, value
            ),
        )
    }

    pub fn expected_leaf(path: &str, actual: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("Expected a leaf on path: {}, received node type: {}", path, actual),
        )
    }

    pub fn expected_array(path: &str, actual: impl fmt::Display) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!("Expected an array on path: {}, received node type: {}", path, actual),
        )
    }

    pub fn decoder_type_mismatch(decoder: &str, type_name: &str) -> Self {
        Self::new(
            ValidationLevel::Error,
            format!(
                "Decoder {} returned a value that is not a {}",
                decoder, type_name
            ),
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.description)
    }
}

/// Terminal errors: configuration or programming mistakes rather than data
/// conditions.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Container {id} is already registered")]
    DuplicateContainer { id: u64 },

    #[error("No container registered with id {id}")]
    UnknownContainer { id: u64 },

    #[error("Failed to load source {source_name}: {message}")]
    Source { source_name: String, message: String },

    #[error("Invalid setting {field}: {reason}")]
    Settings { field: String, reason: String },

    #[error("Failed getting config path: {path}, for class: {type_name}\n{}", join_errors(.errors))]
    Validation {
        path: String,
        type_name: String,
        errors: Vec<ValidationError>,
    },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn source_failure(source_name: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn settings(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Settings {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!(" - level: {}, message: {}", e.level, e.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type for operations that can fail terminally.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
