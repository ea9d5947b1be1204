//! The sharding policy emitted by the planner.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Names of the layers in one module class that must not be split across
/// a shard boundary without synchronization: projections paired with a
/// trailing normalization, and output/down projections.
pub type GemSet = BTreeSet<String>;

/// One module class and its gems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub module_class: String,
    pub gems: GemSet,
}

/// Ordered mapping from module class to [`GemSet`].
///
/// Entry order is first-discovery order; a class appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    entries: Vec<PolicyEntry>,
}

impl Policy {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[PolicyEntry] {
        &self.entries
    }

    /// Gems recorded for `module_class`, if any.
    #[must_use]
    pub fn gems_for(&self, module_class: &str) -> Option<&GemSet> {
        self.entries
            .iter()
            .find(|entry| entry.module_class == module_class)
            .map(|entry| &entry.gems)
    }

    /// Merge a classified block into the policy.
    ///
    /// If an entry for `module_class` already exists its gem set is
    /// unioned in place; otherwise a new entry is appended.
    pub fn merge(&mut self, module_class: &str, gems: GemSet) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.module_class == module_class)
        {
            entry.gems.extend(gems);
        } else {
            self.entries.push(PolicyEntry {
                module_class: module_class.to_string(),
                gems,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gems(names: &[&str]) -> GemSet {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn test_merge_appends_new_classes_in_order() {
        let mut policy = Policy::default();
        policy.merge("DecoderLayer", gems(&["self_attn.o_proj"]));
        policy.merge("EncoderLayer", gems(&["attention.out_proj"]));

        assert_eq!(policy.len(), 2);
        assert_eq!(policy.entries()[0].module_class, "DecoderLayer");
        assert_eq!(policy.entries()[1].module_class, "EncoderLayer");
    }

    #[test]
    fn test_merge_unions_existing_class() {
        let mut policy = Policy::default();
        policy.merge("Block", gems(&["attn.o_proj", "mlp.down_proj"]));
        policy.merge("Block", gems(&["mlp.down_proj", "cross_attn.o_proj"]));

        assert_eq!(policy.len(), 1);
        assert_eq!(
            policy.gems_for("Block").unwrap(),
            &gems(&["attn.o_proj", "cross_attn.o_proj", "mlp.down_proj"])
        );
    }

    #[test]
    fn test_gems_for_missing_class() {
        let policy = Policy::default();
        assert!(policy.gems_for("Block").is_none());
    }
}
