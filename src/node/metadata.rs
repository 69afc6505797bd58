//! Per-node metadata and the rollup rules that lift it onto parents.
//!
//! Metadata is keyed by an explicit [`MetadataKind`]. Which kinds roll up
//! from children to a composite parent is decided by a [`MetadataRollups`]
//! table that callers pass in, so there is no process-wide registry.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier for a kind of metadata.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    /// The value must not be cached by consumers.
    NoCache,
    /// The value is sensitive and must not be displayed.
    Secret,
    Custom(String),
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataKind::NoCache => write!(f, "noCache"),
            MetadataKind::Secret => write!(f, "isSecret"),
            MetadataKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A single typed metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl MetadataValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            MetadataValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// Mapping from metadata kind to the values recorded for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<MetadataKind, Vec<MetadataValue>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, kind: MetadataKind, value: MetadataValue) -> Self {
        self.insert(kind, value);
        self
    }

    /// Shorthand for a single boolean flag.
    pub fn flag(kind: MetadataKind, value: bool) -> Self {
        Self::new().with(kind, MetadataValue::Bool(value))
    }

    pub fn insert(&mut self, kind: MetadataKind, value: MetadataValue) {
        self.0.entry(kind).or_default().push(value);
    }

    pub fn get(&self, kind: &MetadataKind) -> Option<&[MetadataValue]> {
        self.0.get(kind).map(|v| v.as_slice())
    }

    pub fn contains(&self, kind: &MetadataKind) -> bool {
        self.0.contains_key(kind)
    }

    /// The boolean held for `kind`. `None` unless every recorded value is
    /// the same boolean.
    pub fn bool_flag(&self, kind: &MetadataKind) -> Option<bool> {
        let values = self.0.get(kind)?;
        let first = values.first()?.as_bool()?;
        values
            .iter()
            .all(|v| v.as_bool() == Some(first))
            .then_some(first)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetadataKind, &[MetadataValue])> {
        self.0.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Combine two metadata sets; for each kind `incoming` replaces `self`.
    pub fn merged_with(&self, incoming: &Metadata) -> Metadata {
        let mut merged = self.0.clone();
        for (kind, values) in &incoming.0 {
            merged.insert(kind.clone(), values.clone());
        }
        Metadata(merged)
    }
}

/// How a metadata kind propagates from children to a composite parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollupRule {
    /// Parent gets `true` only when every direct child carries `true`.
    AllTrue,
}

impl RollupRule {
    fn apply(&self, kind: &MetadataKind, children: &[Option<Metadata>]) -> Option<MetadataValue> {
        match self {
            RollupRule::AllTrue => {
                if children.is_empty() {
                    return None;
                }
                let all_true = children.iter().all(|child| {
                    child
                        .as_ref()
                        .is_some_and(|m| m.bool_flag(kind) == Some(true))
                });
                all_true.then_some(MetadataValue::Bool(true))
            }
        }
    }
}

/// Dispatch table of metadata kinds that roll up, and how.
#[derive(Debug, Clone)]
pub struct MetadataRollups {
    rules: Vec<(MetadataKind, RollupRule)>,
}

impl MetadataRollups {
    /// An empty table: nothing rolls up.
    pub fn none() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, kind: MetadataKind, rule: RollupRule) -> Self {
        self.rules.retain(|(k, _)| *k != kind);
        self.rules.push((kind, rule));
        self
    }

    pub fn rules(&self) -> &[(MetadataKind, RollupRule)] {
        &self.rules
    }

    /// Compute the metadata a composite node exposes given its own metadata
    /// and the rolled-up metadata of each direct child (`None` for holes).
    pub fn roll_up(&self, own: &Metadata, children: &[Option<Metadata>]) -> Metadata {
        let mut result = own.clone();
        for (kind, rule) in &self.rules {
            if own.contains(kind) {
                continue;
            }
            if let Some(value) = rule.apply(kind, children) {
                result.insert(kind.clone(), value);
            }
        }
        result
    }
}

impl Default for MetadataRollups {
    fn default() -> Self {
        Self::none()
            .with_rule(MetadataKind::NoCache, RollupRule::AllTrue)
            .with_rule(MetadataKind::Secret, RollupRule::AllTrue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: bool) -> Option<Metadata> {
        Some(Metadata::flag(MetadataKind::Secret, value))
    }

    #[test]
    fn test_all_true_rolls_up() {
        let rollups = MetadataRollups::default();
        let result = rollups.roll_up(&Metadata::new(), &[secret(true), secret(true)]);
        assert_eq!(result.bool_flag(&MetadataKind::Secret), Some(true));
    }

    #[test]
    fn test_one_false_child_blocks_rollup() {
        let rollups = MetadataRollups::default();
        let result = rollups.roll_up(&Metadata::new(), &[secret(true), secret(false)]);
        assert!(!result.contains(&MetadataKind::Secret));
    }

    #[test]
    fn test_child_with_disagreeing_values_blocks_rollup() {
        let rollups = MetadataRollups::default();
        let mixed = Metadata::flag(MetadataKind::Secret, true).with(MetadataKind::Secret, MetadataValue::Bool(false));
        assert_eq!(mixed.bool_flag(&MetadataKind::Secret), None);
        let result = rollups.roll_up(&Metadata::new(), &[secret(true), Some(mixed)]);
        assert!(!result.contains(&MetadataKind::Secret));
    }

    #[test]
    fn test_child_without_flag_blocks_rollup() {
        let rollups = MetadataRollups::default();
        let result = rollups.roll_up(&Metadata::new(), &[secret(true), Some(Metadata::new())]);
        assert!(!result.contains(&MetadataKind::Secret));
    }

    #[test]
    fn test_hole_blocks_rollup() {
        let rollups = MetadataRollups::default();
        let result = rollups.roll_up(&Metadata::new(), &[secret(true), None]);
        assert!(!result.contains(&MetadataKind::Secret));
    }

    #[test]
    fn test_own_value_is_not_overridden() {
        let rollups = MetadataRollups::default();
        let own = Metadata::flag(MetadataKind::Secret, false);
        let result = rollups.roll_up(&own, &[secret(true), secret(true)]);
        assert_eq!(result.get(&MetadataKind::Secret), Some(&[MetadataValue::Bool(false)][..]));
    }

    #[test]
    fn test_empty_composite_rolls_up_nothing() {
        let rollups = MetadataRollups::default();
        assert!(rollups.roll_up(&Metadata::new(), &[]).is_empty());
    }

    #[test]
    fn test_kind_without_rule_does_not_roll_up() {
        let rollups = MetadataRollups::none();
        let result = rollups.roll_up(&Metadata::new(), &[secret(true)]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_merged_with_replaces_per_kind() {
        let existing = Metadata::flag(MetadataKind::Secret, true)
            .with(MetadataKind::NoCache, MetadataValue::Bool(true));
        let incoming = Metadata::flag(MetadataKind::Secret, false);
        let merged = existing.merged_with(&incoming);
        assert_eq!(merged.bool_flag(&MetadataKind::Secret), Some(false));
        assert_eq!(merged.bool_flag(&MetadataKind::NoCache), Some(true));
    }
}
