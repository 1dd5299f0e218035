//! Graph module: declared dependency graph and discovered dependent index.

mod dependency;
mod dependents;

pub use dependency::DependencyGraph;
pub use dependents::DependentIndex;
