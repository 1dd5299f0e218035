//! Ports - traits at the orchestrator's seams.
//!
//! - `Module`: what the host plugs in
//! - `EventSink`: where lifecycle events go
//! - `Clock`, `IdGenerator`: time and id sources, swappable in tests

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod module;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::module::Module;
