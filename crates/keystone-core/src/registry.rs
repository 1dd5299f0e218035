use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::domain::ModuleId;
use crate::graph::DependencyGraph;
use crate::ports::Module;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("module {0} is already registered")]
    Duplicate(ModuleId),
}

/// Problem found by `ModuleRegistry::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryIssue {
    #[error("module {module} depends on {dependency}, which has not been registered")]
    MissingDependency {
        module: ModuleId,
        dependency: ModuleId,
    },

    #[error("dependency cycle: {}", .0.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(" -> "))]
    Cycle(Vec<ModuleId>),
}

/// Registry of modules (id -> module).
///
/// Design:
/// - Built during initialization (mutable).
/// - Owned by the orchestrator afterwards (immutable).
/// - Unregistered dependencies are accepted here; the start of the dependent
///   branch fails instead. Call `validate()` for an up-front check.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<ModuleId, Arc<dyn Module>>,
    graph: DependencyGraph,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, module: Arc<dyn Module>) -> Result<(), RegistryError> {
        let id = module.id().clone();
        if self.modules.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        self.graph.add_module(id.clone());
        for dep in module.dependencies() {
            self.graph.add_dependency(id.clone(), dep.clone());
        }
        self.modules.insert(id, module);
        Ok(())
    }

    pub fn get(&self, id: &ModuleId) -> Option<&Arc<dyn Module>> {
        self.modules.get(id)
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.modules.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Graph of the declared dependencies.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Check every declaration; returns all issues, not just the first.
    pub fn validate(&self) -> Result<(), Vec<RegistryIssue>> {
        let mut issues: Vec<RegistryIssue> = self
            .graph
            .dangling_edges()
            .into_iter()
            .map(|(module, dependency)| RegistryIssue::MissingDependency { module, dependency })
            .collect();

        if let Some(cycle) = self.graph.detect_cycle() {
            issues.push(RegistryIssue::Cycle(cycle));
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(issues)
        }
    }
}
