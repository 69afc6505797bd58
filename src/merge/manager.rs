//! Overlay root table and source registration.
//!
//! Each registered source is a [`ConfigNodeContainer`]. Containers sharing a
//! tag set are merged in registration order into a single root, and the
//! roots are published together as an immutable [`OverlayTable`] behind an
//! `ArcSwap`. Readers take a snapshot with [`ConfigNodeManager::table`] and
//! keep seeing it until they fetch again; writers are serialized by a mutex
//! and swap in a fresh table.

use super::{merge_nodes_delimited, validate_node_delimited};
use crate::error::{ConfigError, ConfigResult, ValidationError, ValidationLevel};
use crate::node::ConfigNode;
use crate::path::{Token, navigate};
use crate::strategy::TagResolutionStrategy;
use crate::tags::Tags;
use crate::validated::Validated;
use arc_swap::ArcSwap;
use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable handle for one registered source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(u64);

impl ContainerId {
    fn next() -> Self {
        Self(NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A source's root node together with its id and overlay tags.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigNodeContainer {
    id: ContainerId,
    label: String,
    tags: Tags,
    root: ConfigNode,
}

impl ConfigNodeContainer {
    /// Wrap a freshly loaded tree; a new id is assigned.
    pub fn new(label: impl Into<String>, root: ConfigNode, tags: Tags) -> Self {
        Self {
            id: ContainerId::next(),
            label: label.into(),
            tags,
            root,
        }
    }

    /// Same source, new content. Used for reloads.
    pub fn replaced(&self, root: ConfigNode) -> Self {
        Self {
            root,
            ..self.clone()
        }
    }

    /// Same source, moved to another overlay.
    pub fn retagged(&self, tags: Tags) -> Self {
        Self {
            tags,
            ..self.clone()
        }
    }

    pub fn id(&self) -> ContainerId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn root(&self) -> &ConfigNode {
        &self.root
    }
}

/// One merged root per exact tag set, in first-registration order.
#[derive(Debug, Clone, Default)]
pub struct OverlayTable {
    roots: IndexMap<Tags, Arc<ConfigNode>>,
}

impl OverlayTable {
    pub fn from_roots(roots: impl IntoIterator<Item = (Tags, ConfigNode)>) -> Self {
        Self {
            roots: roots.into_iter().map(|(t, n)| (t, Arc::new(n))).collect(),
        }
    }

    pub fn get(&self, tags: &Tags) -> Option<&Arc<ConfigNode>> {
        self.roots.get(tags)
    }

    /// The root of the empty tag set.
    pub fn default_root(&self) -> Option<&Arc<ConfigNode>> {
        self.roots.get(&Tags::none())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tags, &Arc<ConfigNode>)> {
        self.roots.iter()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    fn with_root(&self, tags: Tags, root: Arc<ConfigNode>) -> Self {
        let mut roots = self.roots.clone();
        roots.insert(tags, root);
        Self { roots }
    }

    fn without(&self, tags: &Tags) -> Self {
        let mut roots = self.roots.clone();
        roots.shift_remove(tags);
        Self { roots }
    }
}

/// Registers sources and maintains the overlay table.
pub struct ConfigNodeManager {
    table: ArcSwap<OverlayTable>,
    containers: Mutex<Vec<ConfigNodeContainer>>,
    delimiter: char,
}

impl ConfigNodeManager {
    pub fn new() -> Self {
        Self::with_delimiter('.')
    }

    /// A manager whose diagnostics join path keys with `delimiter`.
    pub fn with_delimiter(delimiter: char) -> Self {
        Self {
            table: ArcSwap::from_pointee(OverlayTable::default()),
            containers: Mutex::new(Vec::new()),
            delimiter,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ConfigNodeContainer>> {
        self.containers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current overlay table.
    pub fn table(&self) -> Arc<OverlayTable> {
        self.table.load_full()
    }

    /// The merged root for exactly `tags`.
    pub fn root(&self, tags: &Tags) -> Option<Arc<ConfigNode>> {
        self.table.load().get(tags).cloned()
    }

    /// Registered containers in registration order.
    pub fn containers(&self) -> Vec<ConfigNodeContainer> {
        self.lock().clone()
    }

    pub fn container(&self, id: ContainerId) -> Option<ConfigNodeContainer> {
        self.lock().iter().find(|c| c.id == id).cloned()
    }

    /// Register a new source and merge it over its overlay's root.
    pub fn add(&self, container: ConfigNodeContainer) -> ConfigResult<Validated<Arc<ConfigNode>>> {
        let mut containers = self.lock();
        if containers.iter().any(|c| c.id == container.id) {
            return Err(ConfigError::DuplicateContainer {
                id: container.id.value(),
            });
        }

        let (cleaned, mut errors) = validate_node_delimited("", self.delimiter, &container.root).into_parts();
        let cleaned = cleaned.unwrap_or_else(|| container.root.clone());

        let table = self.table.load_full();
        let merged = match table.get(&container.tags) {
            None => cleaned,
            Some(existing) => {
                let (merged, merge_errors) = merge_nodes_delimited("", self.delimiter, existing, &cleaned).into_parts();
                errors.extend(merge_errors);
                merged.unwrap_or(cleaned)
            }
        };

        let root = Arc::new(merged);
        self.table
            .store(Arc::new(table.with_root(container.tags.clone(), Arc::clone(&root))));

        info!(
            container = %container.id,
            label = %container.label,
            tags = %container.tags,
            "Registered configuration source"
        );
        debug!(
            container = %container.id,
            diagnostics = errors.len(),
            "Merged configuration source"
        );

        containers.push(container);
        Ok(Validated::of(Some(root), errors))
    }

    /// Replace a registered source's content and recompute its overlay from
    /// every container in registration order.
    pub fn reload(&self, container: ConfigNodeContainer) -> ConfigResult<Validated<Arc<ConfigNode>>> {
        let mut containers = self.lock();
        let position = containers
            .iter()
            .position(|c| c.id == container.id)
            .ok_or(ConfigError::UnknownContainer {
                id: container.id.value(),
            })?;

        let old_tags = containers[position].tags.clone();
        let new_tags = container.tags.clone();
        let (_, mut errors) = validate_node_delimited("", self.delimiter, &container.root).into_parts();
        containers[position] = container;

        let mut table = (*self.table.load_full()).clone();
        let (root, rebuild_errors) = rebuild(&containers, &new_tags, self.delimiter);
        errors.extend(rebuild_errors);
        let root = root.map(Arc::new);
        if let Some(ref root) = root {
            table = table.with_root(new_tags.clone(), Arc::clone(root));
        }

        if old_tags != new_tags {
            let (old_root, old_errors) = rebuild(&containers, &old_tags, self.delimiter);
            errors.extend(old_errors);
            table = match old_root {
                Some(node) => table.with_root(old_tags, Arc::new(node)),
                None => table.without(&old_tags),
            };
        }

        self.table.store(Arc::new(table));
        info!(
            container = %containers[position].id,
            label = %containers[position].label,
            tags = %new_tags,
            "Reloaded configuration source"
        );

        Ok(Validated::of(root, errors))
    }

    /// Unregister a source and recompute its overlay.
    pub fn remove(&self, id: ContainerId) -> ConfigResult<Vec<ValidationError>> {
        let mut containers = self.lock();
        let position = containers
            .iter()
            .position(|c| c.id == id)
            .ok_or(ConfigError::UnknownContainer { id: id.value() })?;
        let removed = containers.remove(position);

        let table = self.table.load_full();
        let (root, errors) = rebuild(&containers, &removed.tags, self.delimiter);
        let table = match root {
            Some(node) => table.with_root(removed.tags.clone(), Arc::new(node)),
            None => table.without(&removed.tags),
        };
        self.table.store(Arc::new(table));
        info!(container = %id, label = %removed.label, "Removed configuration source");
        Ok(errors)
    }

    /// Merge the roots selected by `strategy` into a single view, later
    /// roots overriding earlier ones.
    ///
    /// Conflicts between overlays are deliberate overrides, so blocking
    /// diagnostics raised while combining them are downgraded to warnings.
    pub fn resolve(&self, tags: &Tags, strategy: &dyn TagResolutionStrategy) -> Validated<Arc<ConfigNode>> {
        let table = self.table.load_full();
        let mut errors = Vec::new();
        let mut combined: Option<Arc<ConfigNode>> = None;

        for candidate in strategy.roots_to_search(&table, tags) {
            let (root, root_errors) = candidate.into_parts();
            errors.extend(root_errors);
            let Some(root) = root else { continue };
            combined = Some(match combined {
                None => root,
                Some(base) => {
                    let (merged, merge_errors) = merge_nodes_delimited("", self.delimiter, &base, &root).into_parts();
                    errors.extend(merge_errors.into_iter().map(overlay_conflict));
                    merged.map(Arc::new).unwrap_or(root)
                }
            });
        }

        match combined {
            Some(root) => Validated::of(Some(root), errors),
            None => {
                errors.push(ValidationError::no_roots_for_tags(tags));
                Validated::from_errors(errors)
            }
        }
    }

    /// Navigate `tokens` in the view resolved for `tags`.
    pub fn navigate_to_node(
        &self,
        path: &str,
        tokens: &[Token],
        tags: &Tags,
        strategy: &dyn TagResolutionStrategy,
    ) -> Validated<ConfigNode> {
        self.lookup(path, tags, strategy, |root| navigate(path, root, tokens))
    }

    /// Find `path` in every overlay that applies to `tags` and merge the
    /// subtrees found there, lowest priority first.
    ///
    /// Only the requested subtree is merged, so diagnostics are scoped to
    /// `path`. A miss in one overlay is dropped when another overlay has the
    /// node; when none has it, every miss is returned.
    pub fn lookup<F>(&self, path: &str, tags: &Tags, strategy: &dyn TagResolutionStrategy, find: F) -> Validated<ConfigNode>
    where
        F: Fn(&ConfigNode) -> Validated<&ConfigNode>,
    {
        let table = self.table.load_full();
        let mut errors = Vec::new();
        let mut misses: Vec<ValidationError> = Vec::new();
        let mut combined: Option<ConfigNode> = None;
        let mut searched = false;

        for candidate in strategy.roots_to_search(&table, tags) {
            let (root, root_errors) = candidate.into_parts();
            errors.extend(root_errors);
            let Some(root) = root else { continue };
            searched = true;

            let (found, found_errors) = find(root.as_ref()).into_parts();
            let Some(found) = found else {
                for error in found_errors {
                    if !misses.contains(&error) {
                        misses.push(error);
                    }
                }
                continue;
            };
            combined = Some(match combined {
                None => found.clone(),
                Some(base) => {
                    let (merged, merge_errors) = merge_nodes_delimited(path, self.delimiter, &base, found).into_parts();
                    errors.extend(merge_errors.into_iter().map(overlay_conflict));
                    merged.unwrap_or_else(|| found.clone())
                }
            });
        }

        if !searched {
            errors.push(ValidationError::no_roots_for_tags(tags));
            return Validated::from_errors(errors);
        }
        match combined {
            Some(node) => {
                errors.extend(
                    misses
                        .into_iter()
                        .filter(|e| e.level == ValidationLevel::Error)
                        .map(overlay_conflict),
                );
                Validated::of(Some(node), errors)
            }
            None => {
                errors.extend(misses);
                Validated::from_errors(errors)
            }
        }
    }
}

/// Overriding across overlays is intended, so conflicts there only warn.
fn overlay_conflict(error: ValidationError) -> ValidationError {
    if error.level.is_blocking() {
        error.with_level(ValidationLevel::Warn)
    } else {
        error
    }
}

impl Default for ConfigNodeManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-merge every container under `tags` in registration order.
fn rebuild(
    containers: &[ConfigNodeContainer],
    tags: &Tags,
    delimiter: char,
) -> (Option<ConfigNode>, Vec<ValidationError>) {
    let mut errors = Vec::new();
    let mut root: Option<ConfigNode> = None;

    for container in containers.iter().filter(|c| c.tags == *tags) {
        let cleaned = validate_node_delimited("", delimiter, &container.root)
            .into_value()
            .unwrap_or_else(|| container.root.clone());
        root = Some(match root {
            None => cleaned,
            Some(existing) => {
                let (merged, merge_errors) = merge_nodes_delimited("", delimiter, &existing, &cleaned).into_parts();
                errors.extend(merge_errors);
                merged.unwrap_or(cleaned)
            }
        });
    }

    (root, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SubsetTagsWithDefault;

    fn source(label: &str, root: ConfigNode) -> ConfigNodeContainer {
        ConfigNodeContainer::new(label, root, Tags::none())
    }

    fn port_tree(port: &str) -> ConfigNode {
        ConfigNode::map([("db", ConfigNode::map([("port", ConfigNode::leaf(port))]))])
    }

    #[test]
    fn test_first_add_stores_tree() {
        let manager = ConfigNodeManager::new();
        let result = manager.add(source("a", port_tree("100"))).unwrap();
        assert!(!result.has_errors());
        assert_eq!(manager.root(&Tags::none()).as_deref(), Some(&port_tree("100")));
    }

    #[test]
    fn test_duplicate_add_is_rejected() {
        let manager = ConfigNodeManager::new();
        let container = source("a", port_tree("1"));
        manager.add(container.clone()).unwrap();
        assert!(matches!(
            manager.add(container),
            Err(ConfigError::DuplicateContainer { .. })
        ));
    }

    #[test]
    fn test_reload_unknown_container_is_rejected() {
        let manager = ConfigNodeManager::new();
        let container = source("a", port_tree("1"));
        assert!(matches!(
            manager.reload(container),
            Err(ConfigError::UnknownContainer { .. })
        ));
    }

    #[test]
    fn test_reload_keeps_registration_order() {
        let manager = ConfigNodeManager::new();
        let first = source("first", port_tree("1"));
        let second = source("second", port_tree("2"));
        manager.add(first.clone()).unwrap();
        manager.add(second).unwrap();

        // The first source reloads but must not jump ahead of the second.
        manager.reload(first.replaced(port_tree("3"))).unwrap();
        let root = manager.root(&Tags::none()).unwrap();
        let port = root.get_by_key("db").and_then(|db| db.get_by_key("port"));
        assert_eq!(port.and_then(ConfigNode::value), Some("2"));
    }

    #[test]
    fn test_readers_keep_old_snapshot() {
        let manager = ConfigNodeManager::new();
        let container = source("a", port_tree("1"));
        manager.add(container.clone()).unwrap();

        let snapshot = manager.table();
        manager.reload(container.replaced(port_tree("9"))).unwrap();

        assert_eq!(snapshot.default_root().map(|r| r.as_ref()), Some(&port_tree("1")));
        assert_eq!(manager.root(&Tags::none()).as_deref(), Some(&port_tree("9")));
    }

    #[test]
    fn test_reload_with_new_tags_moves_contribution() {
        let manager = ConfigNodeManager::new();
        let container = source("a", port_tree("1"));
        manager.add(container.clone()).unwrap();

        manager
            .reload(container.retagged(Tags::environment("dev")))
            .unwrap();
        let table = manager.table();
        assert!(table.default_root().is_none());
        assert!(table.get(&Tags::environment("dev")).is_some());
    }

    #[test]
    fn test_remove_recomputes_overlay() {
        let manager = ConfigNodeManager::new();
        let first = source("first", port_tree("1"));
        let second = source("second", port_tree("2"));
        manager.add(first).unwrap();
        manager.add(second.clone()).unwrap();

        manager.remove(second.id()).unwrap();
        assert_eq!(manager.root(&Tags::none()).as_deref(), Some(&port_tree("1")));
        assert_eq!(manager.containers().len(), 1);
    }

    #[test]
    fn test_add_reports_validation_and_merge_diagnostics() {
        let manager = ConfigNodeManager::new();
        manager.add(source("a", port_tree("1"))).unwrap();
        let result = manager
            .add(source(
                "b",
                ConfigNode::map([("db", ConfigNode::map([("port", ConfigNode::empty_leaf())]))]),
            ))
            .unwrap();
        let messages: Vec<_> = result.errors().iter().map(|e| e.description.as_str()).collect();
        assert_eq!(
            messages,
            vec![
                "Empty leaf value provided for path: db.port",
                "Unable to override value at path: db.port with an empty value, keeping the existing value",
            ]
        );
        assert_eq!(manager.root(&Tags::none()).as_deref(), Some(&port_tree("1")));
    }

    #[test]
    fn test_resolve_without_roots() {
        let manager = ConfigNodeManager::new();
        let result = manager.resolve(&Tags::none(), &SubsetTagsWithDefault);
        assert!(!result.has_results());
        assert_eq!(
            result.errors()[0].description,
            "No configuration roots found for tags: []"
        );
    }

    #[test]
    fn test_resolve_overlays_tagged_root() {
        let manager = ConfigNodeManager::new();
        manager
            .add(source(
                "base",
                ConfigNode::map([(
                    "db",
                    ConfigNode::map([("port", ConfigNode::leaf("1")), ("name", ConfigNode::leaf("x"))]),
                )]),
            ))
            .unwrap();
        manager
            .add(ConfigNodeContainer::new("dev", port_tree("2"), Tags::environment("dev")))
            .unwrap();

        let tokens = [Token::object("db")];
        let db = manager
            .navigate_to_node("db", &tokens, &Tags::environment("dev"), &SubsetTagsWithDefault)
            .into_value()
            .unwrap();
        assert_eq!(db.get_by_key("port").and_then(ConfigNode::value), Some("2"));
        assert_eq!(db.get_by_key("name").and_then(ConfigNode::value), Some("x"));
    }

    fn conflicting_overlays() -> ConfigNodeManager {
        let manager = ConfigNodeManager::new();
        manager
            .add(source(
                "base",
                ConfigNode::map([
                    ("db", ConfigNode::map([("port", ConfigNode::leaf("100"))])),
                    ("hosts", ConfigNode::array([ConfigNode::leaf("a")])),
                ]),
            ))
            .unwrap();
        manager
            .add(ConfigNodeContainer::new(
                "dev",
                ConfigNode::map([("hosts", ConfigNode::map([("x", ConfigNode::leaf("1"))]))]),
                Tags::environment("dev"),
            ))
            .unwrap();
        manager
    }

    #[test]
    fn test_lookup_ignores_conflicts_elsewhere() {
        let manager = conflicting_overlays();
        let tokens = [Token::object("db"), Token::object("port")];
        let port = manager.navigate_to_node("db.port", &tokens, &Tags::environment("dev"), &SubsetTagsWithDefault);
        assert_eq!(port.value().and_then(|n| n.value()), Some("100"));
        assert!(!port.has_errors());
    }

    #[test]
    fn test_lookup_reports_conflict_at_requested_path() {
        let manager = conflicting_overlays();
        let tokens = [Token::object("hosts")];
        let hosts = manager.navigate_to_node("hosts", &tokens, &Tags::environment("dev"), &SubsetTagsWithDefault);
        assert_eq!(hosts.value().and_then(|n| n.get_by_key("x")).and_then(ConfigNode::value), Some("1"));
        assert_eq!(hosts.errors().len(), 1);
        assert_eq!(hosts.errors()[0].level, ValidationLevel::Warn);
        assert_eq!(
            hosts.errors()[0].description,
            "Unable to merge different nodes, of type: array and type: map, for path: hosts"
        );
    }

    #[test]
    fn test_diagnostics_use_configured_delimiter() {
        let manager = ConfigNodeManager::with_delimiter('/');
        manager.add(source("a", port_tree("1"))).unwrap();
        let result = manager
            .add(source(
                "b",
                ConfigNode::map([("db", ConfigNode::map([("port", ConfigNode::empty_leaf())]))]),
            ))
            .unwrap();
        assert_eq!(result.errors()[0].description, "Empty leaf value provided for path: db/port");
    }

    #[test]
    fn test_lookup_miss_in_every_overlay() {
        let manager = conflicting_overlays();
        let tokens = [Token::object("timeout")];
        let result = manager.navigate_to_node("timeout", &tokens, &Tags::environment("dev"), &SubsetTagsWithDefault);
        assert!(!result.has_results());
        assert_eq!(result.errors().len(), 1);
        assert_eq!(
            result.errors()[0].description,
            "Unable to find node matching path: timeout, for token: timeout"
        );
    }
}
