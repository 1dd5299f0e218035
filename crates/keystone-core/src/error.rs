use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{HookError, ModuleId, ModuleState, Phase};

/// Failure of one module's start or shutdown branch.
///
/// `Clone` because a completion handle is shared by every branch waiting on it.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("module {0} is not registered")]
    UnknownModule(ModuleId),

    #[error("module {module} depends on {dependency}, which has not been registered")]
    MissingDependency {
        module: ModuleId,
        dependency: ModuleId,
    },

    #[error("dependency cycle detected: {}", CyclePath(.0))]
    CycleDetected(Vec<ModuleId>),

    #[error("cannot {phase} module {module} while it is {state}")]
    InvalidTransition {
        module: ModuleId,
        phase: Phase,
        state: ModuleState,
    },

    #[error("module {module} was not started: dependency {dependency} failed")]
    DependencyFailed {
        module: ModuleId,
        dependency: ModuleId,
    },

    #[error("module {module} was not shut down: dependent {dependent} failed to stop")]
    DependentFailed {
        module: ModuleId,
        dependent: ModuleId,
    },

    #[error("{phase} hook of module {module} failed: {source}")]
    HookFailed {
        module: ModuleId,
        phase: Phase,
        #[source]
        source: HookError,
    },

    #[error("{phase} hook of module {module} timed out after {after:?}")]
    HookTimeout {
        module: ModuleId,
        phase: Phase,
        after: Duration,
    },

    #[error("{phase} of module {module} timed out after {after:?} waiting on other modules")]
    WaitTimeout {
        module: ModuleId,
        phase: Phase,
        after: Duration,
    },

    #[error("{phase} of module {module} was cancelled")]
    Cancelled { module: ModuleId, phase: Phase },

    #[error("{phase} task of module {module} aborted: {reason}")]
    Aborted {
        module: ModuleId,
        phase: Phase,
        reason: String,
    },
}

impl LifecycleError {
    /// Is this a failure in its own right, rather than an echo of a failure
    /// somewhere else in the graph?
    pub fn is_root_cause(&self) -> bool {
        !matches!(
            self,
            LifecycleError::DependencyFailed { .. } | LifecycleError::DependentFailed { .. }
        )
    }

    /// Configuration errors are detected while planning, before any hook runs.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LifecycleError::UnknownModule(_)
                | LifecycleError::MissingDependency { .. }
                | LifecycleError::CycleDetected(_)
                | LifecycleError::InvalidTransition { .. }
        )
    }
}

struct CyclePath<'a>(&'a [ModuleId]);

impl fmt::Display for CyclePath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

/// Aggregated result of a bulk start or shutdown.
///
/// Every registered module's branch runs to completion; all failures are
/// collected here, sorted by module id.
#[derive(Debug, Clone, Error)]
#[error("{phase} failed for {} module(s): {}", .failures.len(), FailedModules(.failures))]
pub struct BulkError {
    pub phase: Phase,
    pub failures: Vec<(ModuleId, LifecycleError)>,
}

impl BulkError {
    /// Failures that are not just propagated from another module.
    pub fn root_causes(&self) -> impl Iterator<Item = &(ModuleId, LifecycleError)> {
        self.failures.iter().filter(|(_, e)| e.is_root_cause())
    }

    pub fn failed_modules(&self) -> Vec<&ModuleId> {
        self.failures.iter().map(|(id, _)| id).collect()
    }

    pub fn error_for(&self, id: &ModuleId) -> Option<&LifecycleError> {
        self.failures
            .iter()
            .find(|(failed, _)| failed == id)
            .map(|(_, e)| e)
    }
}

struct FailedModules<'a>(&'a [(ModuleId, LifecycleError)]);

impl fmt::Display for FailedModules<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (id, _)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}")?;
        }
        Ok(())
    }
}
