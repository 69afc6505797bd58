//! Building trees from files, parsed documents and the environment.

use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigNodeContainer, merge_nodes};
use crate::node::ConfigNode;
use crate::tags::Tags;
use crate::validated::Validated;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Convert a JSON document. Nulls inside objects become null values, nulls
/// inside arrays become holes.
pub fn node_from_json(value: &serde_json::Value) -> ConfigNode {
    use serde_json::Value;
    match value {
        Value::Null => ConfigNode::empty_leaf(),
        Value::Bool(b) => ConfigNode::leaf(b.to_string()),
        Value::Number(n) => ConfigNode::leaf(n.to_string()),
        Value::String(s) => ConfigNode::leaf(s.as_str()),
        Value::Array(items) => ConfigNode::array_with_holes(items.iter().map(|item| match item {
            Value::Null => None,
            other => Some(node_from_json(other)),
        })),
        Value::Object(entries) => ConfigNode::map_with_nulls(entries.iter().map(|(key, item)| {
            let child = match item {
                Value::Null => None,
                other => Some(node_from_json(other)),
            };
            (key.as_str(), child)
        })),
    }
}

/// Convert a YAML document, with the same null handling as [`node_from_json`].
pub fn node_from_yaml(value: &serde_yaml::Value) -> ConfigNode {
    use serde_yaml::Value;
    match value {
        Value::Null => ConfigNode::empty_leaf(),
        Value::Bool(b) => ConfigNode::leaf(b.to_string()),
        Value::Number(n) => ConfigNode::leaf(n.to_string()),
        Value::String(s) => ConfigNode::leaf(s.as_str()),
        Value::Sequence(items) => ConfigNode::array_with_holes(items.iter().map(|item| match item {
            Value::Null => None,
            other => Some(node_from_yaml(other)),
        })),
        Value::Mapping(entries) => ConfigNode::map_with_nulls(entries.iter().map(|(key, item)| {
            let child = match item {
                Value::Null => None,
                other => Some(node_from_yaml(other)),
            };
            (yaml_key(key), child)
        })),
        Value::Tagged(tagged) => node_from_yaml(&tagged.value),
    }
}

fn yaml_key(key: &serde_yaml::Value) -> String {
    use serde_yaml::Value;
    match key {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("yaml") | Some("yml") => Some(FileFormat::Yaml),
            Some("json") => Some(FileFormat::Json),
            _ => None,
        }
    }
}

/// A configuration file bound to an overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSource {
    pub path: PathBuf,
    pub tags: Tags,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, tags: Tags) -> Self {
        Self {
            path: path.into(),
            tags,
        }
    }

    pub fn label(&self) -> String {
        self.path.display().to_string()
    }

    /// Read and parse the file.
    pub fn load(&self) -> ConfigResult<ConfigNode> {
        let format = FileFormat::from_path(&self.path).ok_or_else(|| {
            ConfigError::source_failure(self.label(), "unsupported file extension, expected .yaml, .yml or .json")
        })?;
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| ConfigError::io(format!("reading {}", self.path.display()), e))?;
        debug!(path = %self.path.display(), ?format, "Loading configuration file");

        match format {
            FileFormat::Yaml => {
                let value: serde_yaml::Value =
                    serde_yaml::from_str(&content).map_err(|e| ConfigError::source_failure(self.label(), e))?;
                Ok(node_from_yaml(&value))
            }
            FileFormat::Json => {
                let value: serde_json::Value =
                    serde_json::from_str(&content).map_err(|e| ConfigError::source_failure(self.label(), e))?;
                Ok(node_from_json(&value))
            }
        }
    }

    /// Load into a fresh container.
    pub fn container(&self) -> ConfigResult<ConfigNodeContainer> {
        Ok(ConfigNodeContainer::new(self.label(), self.load()?, self.tags.clone()))
    }
}

impl fmt::Display for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            write!(f, "{}", self.path.display())
        } else {
            write!(f, "{}@{}", self.path.display(), self.tags)
        }
    }
}

/// `FILE` or `FILE@dim=value,dim=value`.
impl FromStr for FileSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once('@') {
            Some((path, tags)) if tags.contains('=') => Ok(Self::new(path, tags.parse()?)),
            _ => Ok(Self::new(s, Tags::none())),
        }
    }
}

/// Build a tree from `PREFIX_A_B=value` pairs: `a.b = value`.
///
/// Variables are applied in name order; conflicting shapes (`PREFIX_A` and
/// `PREFIX_A_B`) are resolved by the merge rules and reported.
pub fn node_from_env_pairs(
    prefix: &str,
    vars: impl IntoIterator<Item = (String, String)>,
) -> Validated<ConfigNode> {
    let marker = format!("{}_", prefix.to_ascii_uppercase());
    let mut selected: Vec<(String, String)> = vars
        .into_iter()
        .filter_map(|(name, value)| {
            let rest = name.strip_prefix(&marker)?;
            (!rest.is_empty()).then(|| (rest.to_ascii_lowercase(), value))
        })
        .collect();
    selected.sort();

    let mut root = ConfigNode::map(Vec::<(String, ConfigNode)>::new());
    let mut errors = Vec::new();
    for (name, value) in selected {
        let nested = name
            .split('_')
            .rev()
            .fold(ConfigNode::leaf(value), |child, key| ConfigNode::map([(key, child)]));
        let (merged, merge_errors) = merge_nodes("", &root, &nested).into_parts();
        errors.extend(merge_errors);
        if let Some(merged) = merged {
            root = merged;
        }
    }
    Validated::of(Some(root), errors)
}

/// Read `PREFIX_*` variables from the process environment.
pub fn load_env_vars(prefix: &str) -> Validated<ConfigNode> {
    node_from_env_pairs(prefix, std::env::vars())
}
