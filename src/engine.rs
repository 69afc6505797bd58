//! The configuration facade: sources in, typed values out.

use crate::config::EngineSettings;
use crate::decoder::{ConfigLookup, DecoderRegistry};
use crate::error::{ConfigError, ConfigResult, ValidationLevel};
use crate::logging::{DiagnosticFilter, log_diagnostics};
use crate::merge::{ConfigNodeContainer, ConfigNodeManager, ContainerId};
use crate::node::{ConfigNode, MetadataRollups};
use crate::source::{FileSource, load_env_vars};
use crate::strategy::{self, TagResolutionStrategy};
use crate::tags::Tags;
use crate::validated::Validated;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Owns the overlay table, the decoders and the tag strategy.
pub struct OverlayConfig {
    settings: EngineSettings,
    manager: ConfigNodeManager,
    registry: DecoderRegistry,
    strategy: Box<dyn TagResolutionStrategy>,
    rollups: MetadataRollups,
    diagnostics: DiagnosticFilter,
    files: Mutex<Vec<(ContainerId, FileSource)>>,
}

impl OverlayConfig {
    pub fn new(settings: EngineSettings) -> ConfigResult<Self> {
        settings.validate()?;
        let diagnostics = DiagnosticFilter::new(settings.diagnostics_level()?);
        Ok(Self {
            registry: DecoderRegistry::with_defaults(settings.clone()),
            strategy: strategy::from_kind(settings.tag_strategy),
            manager: ConfigNodeManager::with_delimiter(settings.path_delimiter),
            rollups: MetadataRollups::default(),
            diagnostics,
            files: Mutex::new(Vec::new()),
            settings,
        })
    }

    /// Replace the decoder registry, e.g. one with extra decoders registered.
    pub fn with_registry(mut self, registry: DecoderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn TagResolutionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_rollups(mut self, rollups: MetadataRollups) -> Self {
        self.rollups = rollups;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn manager(&self) -> &ConfigNodeManager {
        &self.manager
    }

    pub fn registry(&self) -> &DecoderRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &DiagnosticFilter {
        &self.diagnostics
    }

    fn files(&self) -> MutexGuard<'_, Vec<(ContainerId, FileSource)>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an already built tree.
    pub fn add_container(&self, container: ConfigNodeContainer) -> ConfigResult<ContainerId> {
        let id = container.id();
        let label = container.label().to_string();
        let result = self.manager.add(container)?;
        log_diagnostics(&label, result.errors(), &self.diagnostics);
        Ok(id)
    }

    /// Load and register a file.
    pub fn add_source(&self, source: FileSource) -> ConfigResult<ContainerId> {
        let id = self.add_container(source.container()?)?;
        self.files().push((id, source));
        Ok(id)
    }

    /// Register `PREFIX_*` environment variables as an overlay.
    pub fn add_env(&self, prefix: &str, tags: Tags) -> ConfigResult<ContainerId> {
        let (node, errors) = load_env_vars(prefix).into_parts();
        let label = format!("env:{}", prefix);
        log_diagnostics(&label, &errors, &self.diagnostics);
        let node = node.unwrap_or_else(|| ConfigNode::map(Vec::<(String, ConfigNode)>::new()));
        self.add_container(ConfigNodeContainer::new(label, node, tags))
    }

    /// Registered file sources.
    pub fn sources(&self) -> Vec<(ContainerId, FileSource)> {
        self.files().clone()
    }

    /// Re-read a registered file and swap its contribution in place.
    pub fn reload_source(&self, id: ContainerId) -> ConfigResult<Validated<Arc<ConfigNode>>> {
        let source = self
            .files()
            .iter()
            .find(|(source_id, _)| *source_id == id)
            .map(|(_, source)| source.clone())
            .ok_or(ConfigError::UnknownContainer { id: id.value() })?;
        let container = self
            .manager
            .container(id)
            .ok_or(ConfigError::UnknownContainer { id: id.value() })?;

        let result = self.manager.reload(container.replaced(source.load()?))?;
        log_diagnostics(&source.label(), result.errors(), &self.diagnostics);
        Ok(result)
    }

    /// Reload every registered source backed by `path`. Returns the
    /// containers that were reloaded.
    pub fn reload_path(&self, path: &Path) -> ConfigResult<Vec<ContainerId>> {
        let wanted = canonical(path);
        let ids: Vec<ContainerId> = self
            .files()
            .iter()
            .filter(|(_, source)| canonical(&source.path) == wanted)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            self.reload_source(*id)?;
        }
        if !ids.is_empty() {
            info!(path = %path.display(), count = ids.len(), "Reloaded configuration sources");
        }
        Ok(ids)
    }

    /// The node at `path` in the view resolved for `tags`. Diagnostics only
    /// cover the requested subtree.
    pub fn resolve_node(&self, path: &str, tags: &Tags) -> Validated<ConfigNode> {
        self.manager
            .lookup(path, tags, self.strategy.as_ref(), |root| self.registry.get_node(path, root))
    }

    /// Decode `path` keeping every diagnostic.
    ///
    /// The result carries the node's rolled-up metadata, so callers can tell
    /// whether a value is secret or must not be cached.
    pub fn get_validated<T: 'static>(&self, path: &str, tags: &Tags) -> Validated<T> {
        let (node, errors) = self.resolve_node(path, tags).into_parts();
        let result = match node {
            None => Validated::from_errors(errors),
            Some(node) => {
                let ctx = self.registry.context().with_facade(self);
                let metadata = node.rolled_up_metadata(&self.rollups);
                let decoded = self.registry.decode_node_in::<T>(path, tags, Some(&node), &ctx);
                Validated::of(Some(()), errors)
                    .and_then(|_| decoded)
                    .with_metadata(metadata)
            }
        };
        debug!(path, tags = %tags, diagnostics = result.errors().len(), "Resolved configuration value");
        log_diagnostics(path, result.errors(), &self.diagnostics);
        result
    }

    /// Decode `path`, failing on blocking diagnostics.
    pub fn get<T: 'static>(&self, path: &str, tags: &Tags) -> ConfigResult<T> {
        self.get_validated::<T>(path, tags)
            .into_result(path, std::any::type_name::<T>(), &self.settings)
    }

    /// Decode `path`, falling back to `default` when it is missing or
    /// unusable. With `treat_missing_values_as_errors` the fallback is
    /// refused and the diagnostics are returned instead.
    pub fn get_or<T: 'static>(&self, path: &str, default: T, tags: &Tags) -> ConfigResult<T> {
        let result = self.get_validated::<T>(path, tags);
        let result = if result.has_results() && !result.has_blocking_errors() {
            result
        } else {
            let (_, errors) = result.into_parts();
            Validated::defaulted(default, errors)
        };
        result.into_result(path, std::any::type_name::<T>(), &self.settings)
    }

    /// Decode a value that may legitimately be absent.
    ///
    /// A path that is not there yields `None`; a path that cannot be walked,
    /// such as an index into a map, is still an error.
    pub fn get_optional<T: 'static>(&self, path: &str, tags: &Tags) -> ConfigResult<Option<T>> {
        let (node, errors) = self.resolve_node(path, tags).into_parts();
        let result = if errors.iter().any(|e| e.level == ValidationLevel::Error) {
            Validated::from_errors(errors)
        } else {
            let ctx = self.registry.context().with_facade(self);
            let mut result = self.registry.decode_optional::<T>(path, tags, node.as_ref(), &ctx);
            if node.is_some() {
                result.extend_errors(errors);
            }
            result
        };
        log_diagnostics(path, result.errors(), &self.diagnostics);
        result.into_result(path, std::any::type_name::<T>(), &self.settings)
    }

    /// Decode an array (or comma-separated leaf) at `path`.
    pub fn get_list<T: 'static>(&self, path: &str, tags: &Tags) -> ConfigResult<Vec<T>> {
        let (node, mut errors) = self.resolve_node(path, tags).into_parts();
        let result = match node {
            None => Validated::from_errors(errors),
            Some(node) => {
                let ctx = self.registry.context().with_facade(self);
                let (values, list_errors) = self.registry.decode_list::<T>(path, tags, Some(&node), &ctx).into_parts();
                errors.extend(list_errors);
                Validated::of(values, errors)
            }
        };
        log_diagnostics(path, result.errors(), &self.diagnostics);
        result.into_result(path, std::any::type_name::<Vec<T>>(), &self.settings)
    }

    /// The raw subtree at `path`.
    pub fn get_node(&self, path: &str, tags: &Tags) -> ConfigResult<ConfigNode> {
        self.resolve_node(path, tags).into_result(path, "ConfigNode", &self.settings)
    }

    /// The whole resolved view for `tags` as JSON.
    pub fn dump(&self, tags: &Tags) -> ConfigResult<serde_json::Value> {
        Ok(self.get_node("", tags)?.to_json())
    }
}

impl ConfigLookup for OverlayConfig {
    fn lookup_node(&self, path: &str, tags: &Tags) -> Validated<ConfigNode> {
        self.resolve_node(path, tags)
    }
}

fn canonical(path: &Path) -> std::path::PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
