//! Domain model: identifiers, lifecycle states, hook errors, events.

pub mod errors;
pub mod events;
pub mod ids;
pub mod state;

pub use self::errors::HookError;
pub use self::events::{EventKind, LifecycleEvent};
pub use self::ids::{ModuleId, PassId};
pub use self::state::{ModuleState, Phase};
