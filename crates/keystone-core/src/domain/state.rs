//! Module lifecycle state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half of the lifecycle an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Start,
    Shutdown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Start => f.write_str("start"),
            Phase::Shutdown => f.write_str("shutdown"),
        }
    }
}

/// Lifecycle state of one module, as tracked by the orchestrator.
///
/// State transitions:
/// - Unstarted -> Starting -> Started -> Stopping -> Stopped -> Starting (restart)
/// - Starting -> StartFailed -> Stopped (shutdown clears a failed start)
/// - Starting -> Stopping (shutdown requested while the start is in flight)
/// - Stopping -> Started (shutdown gave up before the hook ran)
/// - Stopping -> StopFailed (shutdown hook failed; terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// Never started.
    Unstarted,

    /// Start planned; waiting on dependencies or running the start hook.
    Starting,

    /// Start hook resolved successfully.
    Started,

    /// Shutdown planned; waiting on dependents or running the shutdown hook.
    Stopping,

    /// Shutdown hook resolved successfully.
    Stopped,

    /// The start failed (hook error, dependency failure, or configuration error).
    StartFailed,

    /// The shutdown hook failed; the module may still be running.
    StopFailed,
}

impl ModuleState {
    /// Is `next` a legal successor of this state?
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, next),
            (Unstarted, Starting)
                | (Starting, Started)
                | (Starting, StartFailed)
                | (Starting, Stopping)
                | (Started, Stopping)
                | (Stopping, Started)
                | (Stopping, Stopped)
                | (Stopping, StopFailed)
                | (Stopped, Starting)
                | (StartFailed, Stopped)
        )
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleState::Unstarted => "unstarted",
            ModuleState::Starting => "starting",
            ModuleState::Started => "started",
            ModuleState::Stopping => "stopping",
            ModuleState::Stopped => "stopped",
            ModuleState::StartFailed => "start_failed",
            ModuleState::StopFailed => "stop_failed",
        };
        f.write_str(s)
    }
}
