//! Engine settings loading and management.

use crate::error::{ConfigError, ConfigResult, ValidationLevel};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit settings file.
pub const SETTINGS_PATH_ENV: &str = "OVERLAY_CONFIG_SETTINGS";

/// Settings that shape merging, navigation and decoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Decode a zero-length leaf as if it had no value.
    #[serde(default)]
    pub treat_empty_string_as_absent: bool,

    /// Fail requests that fell back to a default because of missing data.
    #[serde(default)]
    pub treat_missing_values_as_errors: bool,

    /// Report array holes as `MISSING_VALUE` when decoding lists, instead of
    /// skipping them.
    #[serde(default)]
    pub treat_missing_array_index_as_error: bool,

    /// Separator between path segments.
    #[serde(default = "default_path_delimiter")]
    pub path_delimiter: char,

    /// Which overlay roots participate in a lookup.
    #[serde(default)]
    pub tag_strategy: TagStrategyKind,

    /// Least severe diagnostic level that gets logged.
    #[serde(default = "default_log_level")]
    pub log_diagnostics_level: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            treat_empty_string_as_absent: false,
            treat_missing_values_as_errors: false,
            treat_missing_array_index_as_error: false,
            path_delimiter: default_path_delimiter(),
            tag_strategy: TagStrategyKind::default(),
            log_diagnostics_level: default_log_level(),
        }
    }
}

fn default_path_delimiter() -> char {
    '.'
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Tag resolution strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStrategyKind {
    /// Default root plus every root whose tags are a subset of the request.
    #[default]
    Subset,
    /// Default root plus the root whose tags equal the request.
    Equal,
}

impl TagStrategyKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "subset" => Some(TagStrategyKind::Subset),
            "equal" | "equals" => Some(TagStrategyKind::Equal),
            _ => None,
        }
    }
}

impl EngineSettings {
    /// Load settings from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::io(format!("reading {}", path.display()), e))?;
        let settings: EngineSettings = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::settings(path.display().to_string(), e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Settings from `OVERLAY_CONFIG_SETTINGS`, then
    /// `~/.overlay-config/settings.yaml`, else defaults; environment
    /// overrides are applied last.
    pub fn discover() -> ConfigResult<Self> {
        let mut settings = match Self::discover_path() {
            Some(path) => {
                debug!("Loading engine settings from {}", path.display());
                Self::load(&path)?
            }
            None => Self::default(),
        };
        settings.apply_env_overrides()?;
        Ok(settings)
    }

    fn discover_path() -> Option<PathBuf> {
        if let Ok(explicit) = std::env::var(SETTINGS_PATH_ENV) {
            return Some(PathBuf::from(explicit));
        }
        dirs::home_dir()
            .map(|home| home.join(".overlay-config").join("settings.yaml"))
            .filter(|path| path.exists())
    }

    /// Apply `OVERLAY_CONFIG_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        if let Ok(value) = std::env::var("OVERLAY_CONFIG_TREAT_EMPTY_AS_ABSENT") {
            self.treat_empty_string_as_absent = parse_bool("OVERLAY_CONFIG_TREAT_EMPTY_AS_ABSENT", &value)?;
        }
        if let Ok(value) = std::env::var("OVERLAY_CONFIG_MISSING_AS_ERRORS") {
            self.treat_missing_values_as_errors = parse_bool("OVERLAY_CONFIG_MISSING_AS_ERRORS", &value)?;
        }
        if let Ok(value) = std::env::var("OVERLAY_CONFIG_TAG_STRATEGY") {
            self.tag_strategy = TagStrategyKind::parse(&value).ok_or_else(|| {
                ConfigError::settings("OVERLAY_CONFIG_TAG_STRATEGY", format!("unknown strategy '{}'", value))
            })?;
        }
        self.validate()
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        self.diagnostics_level()?;
        if self.path_delimiter == '[' || self.path_delimiter == ']' || self.path_delimiter.is_whitespace() {
            return Err(ConfigError::settings(
                "path_delimiter",
                format!("'{}' cannot be used as a path delimiter", self.path_delimiter),
            ));
        }
        Ok(())
    }

    /// The parsed `log_diagnostics_level`.
    pub fn diagnostics_level(&self) -> ConfigResult<ValidationLevel> {
        ValidationLevel::parse(&self.log_diagnostics_level).ok_or_else(|| {
            ConfigError::settings(
                "log_diagnostics_level",
                format!("unknown level '{}'", self.log_diagnostics_level),
            )
        })
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::settings(field, format!("expected a boolean, got '{}'", other))),
    }
}
