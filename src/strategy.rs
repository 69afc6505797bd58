//! Choosing which overlay roots take part in a lookup.

use crate::config::TagStrategyKind;
use crate::merge::OverlayTable;
use crate::node::ConfigNode;
use crate::tags::Tags;
use crate::validated::Validated;
use std::sync::Arc;

/// Selects the roots to search for a tag request, lowest priority first.
pub trait TagResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn roots_to_search(&self, table: &OverlayTable, tags: &Tags) -> Vec<Validated<Arc<ConfigNode>>>;
}

/// The default root, then the root whose tags equal the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualTagsWithDefault;

impl TagResolutionStrategy for EqualTagsWithDefault {
    fn name(&self) -> &'static str {
        "equal"
    }

    fn roots_to_search(&self, table: &OverlayTable, tags: &Tags) -> Vec<Validated<Arc<ConfigNode>>> {
        let mut roots = Vec::with_capacity(2);
        if let Some(root) = table.default_root() {
            roots.push(Validated::ok(Arc::clone(root)));
        }
        if tags.is_empty() {
            return roots;
        }
        if let Some(root) = table.get(tags) {
            roots.push(Validated::ok(Arc::clone(root)));
        }
        roots
    }
}

/// The default root, then every tagged root whose tags are contained in the
/// request, in table order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetTagsWithDefault;

impl TagResolutionStrategy for SubsetTagsWithDefault {
    fn name(&self) -> &'static str {
        "subset"
    }

    fn roots_to_search(&self, table: &OverlayTable, tags: &Tags) -> Vec<Validated<Arc<ConfigNode>>> {
        let mut roots: Vec<_> = table.default_root().map(|r| Validated::ok(Arc::clone(r))).into_iter().collect();
        roots.extend(
            table
                .iter()
                .filter(|(root_tags, _)| !root_tags.is_empty() && root_tags.is_subset_of(tags))
                .map(|(_, root)| Validated::ok(Arc::clone(root))),
        );
        roots
    }
}

/// The strategy named in settings.
pub fn from_kind(kind: TagStrategyKind) -> Box<dyn TagResolutionStrategy> {
    match kind {
        TagStrategyKind::Subset => Box::new(SubsetTagsWithDefault),
        TagStrategyKind::Equal => Box::new(EqualTagsWithDefault),
    }
}
