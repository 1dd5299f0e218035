//! TracingEventSink - forwards lifecycle events to `tracing`.

use tracing::{debug, info, warn};

use crate::domain::{EventKind, LifecycleEvent};
use crate::ports::EventSink;

/// Default sink: one structured log line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: LifecycleEvent) {
        let module = event.module.as_str();
        let phase = event.phase;
        match event.kind {
            EventKind::DependencyRecorded { dependency } => {
                debug!(module, %dependency, "dependency recorded");
            }
            EventKind::Waiting { on } => {
                debug!(module, %phase, waiting_on = ?on, "waiting");
            }
            EventKind::HookStarted => {
                debug!(module, %phase, "hook started");
            }
            EventKind::Completed { elapsed } => {
                info!(module, %phase, elapsed_ms = elapsed.as_millis() as u64, "completed");
            }
            EventKind::HookErrorSuppressed { error } => {
                warn!(module, %phase, %error, "hook error suppressed");
            }
            EventKind::Skipped => {
                debug!(module, %phase, "nothing to do");
            }
            EventKind::Failed { error } => {
                warn!(module, %phase, %error, "failed");
            }
        }
    }
}
