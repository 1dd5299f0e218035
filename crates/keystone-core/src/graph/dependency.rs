//! Declared dependency graph, computed statically from module declarations.
//!
//! Design:
//! - Forward edges: module -> modules it depends on
//! - Reverse edges: module -> modules that depend on it
//! - Invariant: edges and reverse_edges must be kept in sync
//! - Every module is a node even without edges; dependencies that were never
//!   registered show up as edge targets but not as nodes

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::domain::ModuleId;

/// Dependency graph over module ids.
///
/// Sets are `BTreeSet` so that traversal order (and therefore topological
/// order and reported cycles) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Registered modules.
    nodes: BTreeSet<ModuleId>,

    /// Forward edges: module -> modules it depends on.
    edges: HashMap<ModuleId, BTreeSet<ModuleId>>,

    /// Reverse edges: module -> modules depending on it.
    reverse_edges: HashMap<ModuleId, BTreeSet<ModuleId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// Not visited yet.
    White,
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node.
    pub fn add_module(&mut self, module: ModuleId) {
        self.nodes.insert(module);
    }

    /// Add a dependency: `module` depends on `depends_on`.
    ///
    /// Example: add_dependency(b, a) means "B starts after A"
    pub fn add_dependency(&mut self, module: ModuleId, depends_on: ModuleId) {
        self.edges
            .entry(module.clone())
            .or_default()
            .insert(depends_on.clone());
        self.reverse_edges
            .entry(depends_on)
            .or_default()
            .insert(module);
    }

    pub fn contains(&self, module: &ModuleId) -> bool {
        self.nodes.contains(module)
    }

    /// Modules `module` depends on.
    pub fn dependencies_of(&self, module: &ModuleId) -> Vec<ModuleId> {
        self.edges
            .get(module)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Modules that declared `module` as a dependency.
    pub fn dependents_of(&self, module: &ModuleId) -> Vec<ModuleId> {
        self.reverse_edges
            .get(module)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Edges pointing at modules that are not nodes, as (module, missing dependency).
    pub fn dangling_edges(&self) -> Vec<(ModuleId, ModuleId)> {
        let mut dangling = Vec::new();
        for module in &self.nodes {
            for dep in self.edges.get(module).into_iter().flatten() {
                if !self.nodes.contains(dep) {
                    dangling.push((module.clone(), dep.clone()));
                }
            }
        }
        dangling
    }

    /// Detect a cycle among registered modules.
    ///
    /// Three-colour DFS: a Gray node reached again closes a cycle, which is
    /// read back from the current path. Returns the cycle as a closed path
    /// (`[a, b, a]`), or None if the graph is acyclic.
    pub fn detect_cycle(&self) -> Option<Vec<ModuleId>> {
        let mut colors: HashMap<&ModuleId, Color> =
            self.nodes.iter().map(|n| (n, Color::White)).collect();
        let mut path: Vec<&ModuleId> = Vec::new();

        for start in &self.nodes {
            if colors.get(start) == Some(&Color::White)
                && let Some(cycle) = self.dfs_cycle(start, &mut colors, &mut path)
            {
                return Some(cycle);
            }
        }
        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a ModuleId,
        colors: &mut HashMap<&'a ModuleId, Color>,
        path: &mut Vec<&'a ModuleId>,
    ) -> Option<Vec<ModuleId>> {
        colors.insert(node, Color::Gray);
        path.push(node);

        for dep in self.edges.get(node).into_iter().flatten() {
            match colors.get(dep) {
                Some(Color::Gray) => {
                    let from = path.iter().position(|n| *n == dep).unwrap_or(0);
                    let mut cycle: Vec<ModuleId> =
                        path[from..].iter().map(|n| (*n).clone()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Some(Color::White) => {
                    if let Some(cycle) = self.dfs_cycle(dep, colors, path) {
                        return Some(cycle);
                    }
                }
                // Black: already explored. None: not registered, nothing to follow.
                Some(Color::Black) | None => {}
            }
        }

        colors.insert(node, Color::Black);
        path.pop();
        None
    }

    /// Start order over registered modules (Kahn's algorithm).
    ///
    /// Dependencies come before their dependents; among modules that are
    /// ready at the same time, the smaller id comes first. Edges to
    /// unregistered modules are ignored. On a cycle, returns the modules that
    /// could not be ordered.
    pub fn topological_order(&self) -> Result<Vec<ModuleId>, Vec<ModuleId>> {
        let mut in_degree: BTreeMap<&ModuleId, usize> = BTreeMap::new();
        for node in &self.nodes {
            let degree = self
                .edges
                .get(node)
                .map(|deps| deps.iter().filter(|d| self.nodes.contains(*d)).count())
                .unwrap_or(0);
            in_degree.insert(node, degree);
        }

        let mut ready: BTreeSet<&ModuleId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node.clone());
            for dependent in self.reverse_edges.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let ordered: BTreeSet<&ModuleId> = order.iter().collect();
            Err(self
                .nodes
                .iter()
                .filter(|n| !ordered.contains(n))
                .cloned()
                .collect())
        }
    }

    /// Shutdown order: the reverse of `topological_order`.
    pub fn shutdown_order(&self) -> Result<Vec<ModuleId>, Vec<ModuleId>> {
        let mut order = self.topological_order()?;
        order.reverse();
        Ok(order)
    }

    /// Every module reachable from `module` through dependency edges,
    /// `module` excluded, in breadth-first order.
    pub fn transitive_dependencies(&self, module: &ModuleId) -> Vec<ModuleId> {
        let mut seen: BTreeSet<&ModuleId> = BTreeSet::new();
        let mut queue: VecDeque<&ModuleId> = VecDeque::new();
        let mut out = Vec::new();
        queue.push_back(module);
        while let Some(current) = queue.pop_front() {
            for dep in self.edges.get(current).into_iter().flatten() {
                if dep != module && seen.insert(dep) {
                    out.push(dep.clone());
                    queue.push_back(dep);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::from(s)
    }

    fn graph(decls: &[(&str, &[&str])]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (module, deps) in decls {
            g.add_module(id(module));
            for dep in *deps {
                g.add_dependency(id(module), id(dep));
            }
        }
        g
    }

    #[test]
    fn new_graph_is_empty() {
        let g = DependencyGraph::new();
        assert!(g.dependencies_of(&id("a")).is_empty());
        assert_eq!(g.topological_order(), Ok(vec![]));
    }

    #[test]
    fn add_dependency_creates_both_edges() {
        let g = graph(&[("a", &[]), ("b", &["a"])]);

        assert_eq!(g.dependencies_of(&id("b")), vec![id("a")]);
        assert!(g.dependencies_of(&id("a")).is_empty());
        assert_eq!(g.dependents_of(&id("a")), vec![id("b")]);
    }

    #[test]
    fn dangling_edges_report_unregistered_dependencies() {
        let g = graph(&[("api", &["db", "cache"]), ("cache", &[])]);
        assert_eq!(g.dangling_edges(), vec![(id("api"), id("db"))]);
    }

    #[test]
    fn detect_simple_cycle() {
        let g = graph(&[("a", &["b"]), ("b", &["a"])]);
        assert_eq!(g.detect_cycle(), Some(vec![id("a"), id("b"), id("a")]));
    }

    #[test]
    fn detect_self_dependency() {
        let g = graph(&[("a", &["a"])]);
        assert_eq!(g.detect_cycle(), Some(vec![id("a"), id("a")]));
    }

    #[test]
    fn detect_longer_cycle() {
        // a <- b <- c <- d <- b
        let g = graph(&[("a", &[]), ("b", &["a", "d"]), ("c", &["b"]), ("d", &["c"])]);
        let cycle = g.detect_cycle().expect("cycle");
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&id("b")));
        assert!(cycle.contains(&id("c")));
        assert!(cycle.contains(&id("d")));
        assert!(!cycle.contains(&id("a")));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        assert!(g.detect_cycle().is_none());
    }

    #[test]
    fn complex_dag_with_cross_edges_is_not_a_cycle() {
        let g = graph(&[
            ("a", &[]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("d", &["b", "c"]),
            ("e", &["b", "c"]),
        ]);
        assert!(g.detect_cycle().is_none());
    }

    #[test]
    fn topological_order_respects_dependencies() {
        let g = graph(&[("c", &["b"]), ("b", &["a"]), ("a", &[])]);
        assert_eq!(g.topological_order(), Ok(vec![id("a"), id("b"), id("c")]));
        assert_eq!(g.shutdown_order(), Ok(vec![id("c"), id("b"), id("a")]));
    }

    #[test]
    fn topological_order_of_diamond() {
        let g = graph(&[("d", &["b", "c"]), ("c", &["a"]), ("b", &["a"]), ("a", &[])]);
        assert_eq!(
            g.topological_order(),
            Ok(vec![id("a"), id("b"), id("c"), id("d")])
        );
    }

    #[test]
    fn topological_order_ignores_unregistered_dependencies() {
        let g = graph(&[("api", &["db"])]);
        assert_eq!(g.topological_order(), Ok(vec![id("api")]));
    }

    #[test]
    fn topological_order_reports_unorderable_modules() {
        let g = graph(&[("a", &[]), ("b", &["a", "c"]), ("c", &["b"])]);
        assert_eq!(g.topological_order(), Err(vec![id("b"), id("c")]));
    }

    #[test]
    fn transitive_dependencies_are_breadth_first() {
        let g = graph(&[("a", &[]), ("b", &["a"]), ("c", &["a"]), ("d", &["b", "c"])]);
        assert_eq!(
            g.transitive_dependencies(&id("d")),
            vec![id("b"), id("c"), id("a")]
        );
        assert!(g.transitive_dependencies(&id("a")).is_empty());
    }
}
