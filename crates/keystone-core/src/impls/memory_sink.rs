//! MemoryEventSink - keeps every event in memory (テスト・デバッグ用).

use std::sync::{Mutex, PoisonError};

use crate::domain::{LifecycleEvent, ModuleId, Phase};
use crate::ports::EventSink;

#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events so far, in emission order.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Index of the first event matching `module`, `phase` and `pred`.
    pub fn position(
        &self,
        module: &ModuleId,
        phase: Phase,
        pred: impl Fn(&LifecycleEvent) -> bool,
    ) -> Option<usize> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .position(|e| &e.module == module && e.phase == phase && pred(e))
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
