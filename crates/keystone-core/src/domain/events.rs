//! Events - lifecycle events emitted by the orchestrator.
//!
//! Events are delivered to an `EventSink` in the order the orchestrator
//! observes them, so for a single sink "A started" is always recorded before
//! "B start hook began" when B depends on A.

use chrono::{DateTime, Utc};
use std::time::Duration;

use super::{HookError, ModuleId, Phase};
use crate::error::LifecycleError;

#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub at: DateTime<Utc>,
    pub module: ModuleId,
    pub phase: Phase,
    pub kind: EventKind,
}

#[derive(Debug, Clone)]
pub enum EventKind {
    /// A start pass traversed `module` depending on `dependency` (start phase only).
    DependencyRecorded { dependency: ModuleId },

    /// The branch is waiting for these modules before running its hook.
    Waiting { on: Vec<ModuleId> },

    /// The module's own hook is about to be invoked.
    HookStarted,

    /// The branch finished successfully.
    Completed { elapsed: Duration },

    /// The hook failed but the configured policy treats it as success.
    HookErrorSuppressed { error: HookError },

    /// Nothing to do (e.g. shutdown of a module that never started).
    Skipped,

    /// The branch failed.
    Failed { error: LifecycleError },
}

impl LifecycleEvent {
    pub fn new(at: DateTime<Utc>, module: ModuleId, phase: Phase, kind: EventKind) -> Self {
        Self {
            at,
            module,
            phase,
            kind,
        }
    }

    pub fn is_hook_started(&self) -> bool {
        matches!(self.kind, EventKind::HookStarted)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.kind, EventKind::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, EventKind::Failed { .. })
    }
}
