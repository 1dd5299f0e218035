//! Dependent index: reverse edges discovered while starting modules.
//!
//! Unlike `DependencyGraph`, nothing here is precomputed. An edge
//! `dependency -> dependent` exists only once a start pass has traversed it,
//! and entries are never removed.

use std::collections::{BTreeMap, HashMap};

use crate::domain::ModuleId;

/// dependency -> dependents, each list in discovery order without duplicates.
#[derive(Debug, Clone, Default)]
pub struct DependentIndex {
    dependents: HashMap<ModuleId, Vec<ModuleId>>,
}

impl DependentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` depends on `dependency`.
    ///
    /// Returns true if the edge was new.
    pub fn record(&mut self, dependency: &ModuleId, dependent: &ModuleId) -> bool {
        let list = self.dependents.entry(dependency.clone()).or_default();
        if list.contains(dependent) {
            return false;
        }
        list.push(dependent.clone());
        true
    }

    /// Dependents discovered so far (empty if none).
    pub fn dependents_of(&self, dependency: &ModuleId) -> &[ModuleId] {
        self.dependents
            .get(dependency)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }

    /// Sorted copy for inspection.
    pub fn snapshot(&self) -> BTreeMap<ModuleId, Vec<ModuleId>> {
        self.dependents
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_index_is_empty() {
        let index = DependentIndex::new();
        assert!(index.is_empty());
        assert!(index.dependents_of(&ModuleId::from("a")).is_empty());
    }

    #[test]
    fn record_appends_once_in_discovery_order() {
        let mut index = DependentIndex::new();
        let a = ModuleId::from("a");

        assert!(index.record(&a, &ModuleId::from("c")));
        assert!(index.record(&a, &ModuleId::from("b")));
        assert!(!index.record(&a, &ModuleId::from("c")));

        assert_eq!(
            index.dependents_of(&a),
            &[ModuleId::from("c"), ModuleId::from("b")]
        );
    }

    #[test]
    fn snapshot_is_sorted_by_dependency() {
        let mut index = DependentIndex::new();
        index.record(&ModuleId::from("b"), &ModuleId::from("c"));
        index.record(&ModuleId::from("a"), &ModuleId::from("b"));

        let keys: Vec<_> = index.snapshot().into_keys().collect();
        assert_eq!(keys, vec![ModuleId::from("a"), ModuleId::from("b")]);
    }
}
