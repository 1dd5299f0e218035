//! Status - ステータスクエリ
//!
//! `Orchestrator::status()` / `counts()` の戻り値。CLI がそのまま JSON にする。

use serde::{Deserialize, Serialize};

use crate::domain::{ModuleId, ModuleState};

/// One module as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub id: ModuleId,
    pub name: String,
    pub state: ModuleState,
    /// Declared dependencies.
    pub dependencies: Vec<ModuleId>,
    /// Dependents discovered by start passes.
    pub dependents: Vec<ModuleId>,
}

/// Number of modules in each state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCounts {
    pub unstarted: usize,
    pub starting: usize,
    pub started: usize,
    pub stopping: usize,
    pub stopped: usize,
    pub start_failed: usize,
    pub stop_failed: usize,
}

impl LifecycleCounts {
    pub fn record(&mut self, state: ModuleState) {
        let slot = match state {
            ModuleState::Unstarted => &mut self.unstarted,
            ModuleState::Starting => &mut self.starting,
            ModuleState::Started => &mut self.started,
            ModuleState::Stopping => &mut self.stopping,
            ModuleState::Stopped => &mut self.stopped,
            ModuleState::StartFailed => &mut self.start_failed,
            ModuleState::StopFailed => &mut self.stop_failed,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.unstarted
            + self.starting
            + self.started
            + self.stopping
            + self.stopped
            + self.start_failed
            + self.stop_failed
    }

    pub fn failed(&self) -> usize {
        self.start_failed + self.stop_failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_counts_each_state() {
        let mut counts = LifecycleCounts::default();
        for state in [
            ModuleState::Started,
            ModuleState::Started,
            ModuleState::StartFailed,
            ModuleState::StopFailed,
        ] {
            counts.record(state);
        }
        assert_eq!(counts.started, 2);
        assert_eq!(counts.failed(), 2);
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn status_serializes_state_in_snake_case() {
        let status = ModuleStatus {
            id: ModuleId::from("db"),
            name: "db".to_string(),
            state: ModuleState::StartFailed,
            dependencies: vec![],
            dependents: vec![ModuleId::from("api")],
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "start_failed");
        assert_eq!(json["dependents"][0], "api");
    }
}
