//! EventSink port - lifecycle event の記録先
//!
//! Implementations live in `impls` (`TracingEventSink`, `MemoryEventSink`).

use crate::domain::LifecycleEvent;

/// Receives every lifecycle event.
///
/// `emit` is called from the orchestrator's branch tasks, sometimes while the
/// orchestrator's state lock is held; it must not block or call back into the
/// orchestrator.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: LifecycleEvent);
}
