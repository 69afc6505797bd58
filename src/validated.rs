//! Result wrapper that carries diagnostics next to a (possibly partial) value.

use crate::config::EngineSettings;
use crate::error::{ConfigError, ConfigResult, ValidationError, ValidationLevel};
use crate::node::Metadata;

/// An optional value, the diagnostics gathered while producing it, whether
/// it came from a default, and auxiliary metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated<T> {
    value: Option<T>,
    errors: Vec<ValidationError>,
    default: bool,
    metadata: Metadata,
}

impl<T> Validated<T> {
    pub fn ok(value: T) -> Self {
        Self::of(Some(value), Vec::new())
    }

    pub fn of(value: Option<T>, errors: Vec<ValidationError>) -> Self {
        Self {
            value,
            errors,
            default: false,
            metadata: Metadata::new(),
        }
    }

    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self::of(None, errors)
    }

    pub fn from_error(error: ValidationError) -> Self {
        Self::of(None, vec![error])
    }

    /// A value supplied in place of a missing one.
    pub fn defaulted(value: T, errors: Vec<ValidationError>) -> Self {
        Self {
            default: true,
            ..Self::of(Some(value), errors)
        }
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_error(mut self, error: ValidationError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn push_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend_errors(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_parts(self) -> (Option<T>, Vec<ValidationError>) {
        (self.value, self.errors)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_default(&self) -> bool {
        self.default
    }

    pub fn has_results(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether any diagnostic is at least as severe as `level`.
    pub fn has_errors_at(&self, level: ValidationLevel) -> bool {
        self.errors.iter().any(|e| e.level <= level)
    }

    /// Whether any diagnostic would fail a top-level request.
    pub fn has_blocking_errors(&self) -> bool {
        self.errors.iter().any(|e| e.level.is_blocking())
    }

    /// Transform the value, keeping diagnostics and flags.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Validated<U> {
        Validated {
            value: self.value.map(f),
            errors: self.errors,
            default: self.default,
            metadata: self.metadata,
        }
    }

    /// Chain a fallible step; diagnostics from both steps are kept.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Validated<U>) -> Validated<U> {
        let Validated {
            value,
            mut errors,
            default,
            metadata,
        } = self;
        match value {
            Some(v) => {
                let next = f(v);
                errors.extend(next.errors);
                Validated {
                    value: next.value,
                    errors,
                    default: default || next.default,
                    metadata: metadata.merged_with(&next.metadata),
                }
            }
            None => Validated {
                value: None,
                errors,
                default,
                metadata,
            },
        }
    }

    /// Collapse into a terminal result.
    ///
    /// Fails when there is no value, or when a blocking diagnostic is present
    /// and the value is not a default the caller accepted. With
    /// `treat_missing_values_as_errors` a defaulted value with blocking
    /// diagnostics fails as well.
    pub fn into_result(self, path: &str, type_name: &str, settings: &EngineSettings) -> ConfigResult<T> {
        let accept_default = self.default && !settings.treat_missing_values_as_errors;
        match self.value {
            Some(value) if !self.errors.iter().any(|e| e.level.is_blocking()) || accept_default => {
                Ok(value)
            }
            _ => {
                let mut errors = self.errors;
                if errors.is_empty() {
                    errors.push(ValidationError::missing_value(path));
                }
                Err(ConfigError::Validation {
                    path: path.to_string(),
                    type_name: type_name.to_string(),
                    errors,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_has_results_without_errors() {
        let result = Validated::ok(5);
        assert!(result.has_results());
        assert!(!result.has_errors());
        assert!(!result.is_default());
    }

    #[test]
    fn test_has_errors_at_uses_severity() {
        let result: Validated<i32> = Validated::from_error(ValidationError::new(ValidationLevel::Warn, "w"));
        assert!(result.has_errors_at(ValidationLevel::Warn));
        assert!(result.has_errors_at(ValidationLevel::Debug));
        assert!(!result.has_errors_at(ValidationLevel::MissingValue));
    }

    #[test]
    fn test_and_then_accumulates_errors() {
        let first = Validated::of(Some(1), vec![ValidationError::new(ValidationLevel::Warn, "a")]);
        let chained = first.and_then(|v| Validated::of(Some(v + 1), vec![ValidationError::new(ValidationLevel::Warn, "b")]));
        assert_eq!(chained.value(), Some(&2));
        assert_eq!(chained.errors().len(), 2);
    }

    #[test]
    fn test_into_result_warn_is_not_blocking() {
        let settings = EngineSettings::default();
        let result = Validated::of(Some(3), vec![ValidationError::new(ValidationLevel::Warn, "w")]);
        assert_eq!(result.into_result("a", "i32", &settings).unwrap(), 3);
    }

    #[test]
    fn test_into_result_error_fails() {
        let settings = EngineSettings::default();
        let result = Validated::of(Some(3), vec![ValidationError::new(ValidationLevel::Error, "bad")]);
        assert!(result.into_result("a", "i32", &settings).is_err());
    }

    #[test]
    fn test_into_result_default_accepted_unless_strict() {
        let settings = EngineSettings::default();
        let result = Validated::defaulted(7, vec![ValidationError::missing_value("a")]);
        assert_eq!(result.clone().into_result("a", "i32", &settings).unwrap(), 7);

        let strict = EngineSettings {
            treat_missing_values_as_errors: true,
            ..EngineSettings::default()
        };
        assert!(result.into_result("a", "i32", &strict).is_err());
    }

    #[test]
    fn test_into_result_without_value_reports_missing() {
        let settings = EngineSettings::default();
        let result: Validated<i32> = Validated::from_errors(Vec::new());
        let err = result.into_result("db.port", "i32", &settings).unwrap_err();
        assert!(err.to_string().contains("Unable to find node matching path: db.port"));
    }
}
