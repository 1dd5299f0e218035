//! IdGenerator port - pass id 生成の抽象化

use std::sync::Arc;

use ulid::Ulid;

use crate::domain::PassId;
use crate::ports::Clock;

pub trait IdGenerator: Send + Sync {
    fn generate_pass_id(&self) -> PassId;
}

/// ULID generator driven by a `Clock`.
///
/// The timestamp part comes from the clock, the random part from `rand`, so a
/// `FixedClock` gives ids that share a timestamp but stay unique.
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl IdGenerator for UlidGenerator {
    fn generate_pass_id(&self) -> PassId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        PassId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
