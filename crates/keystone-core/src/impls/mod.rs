//! Impls - port implementations shipped with the core.
//!
//! - **TracingEventSink**: default sink, logs through `tracing`
//! - **MemoryEventSink**: collects events for tests and inspection

pub mod memory_sink;
pub mod tracing_sink;

pub use self::memory_sink::MemoryEventSink;
pub use self::tracing_sink::TracingEventSink;
