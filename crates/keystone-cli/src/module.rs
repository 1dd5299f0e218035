//! SimulatedModule - config から作るダミー module
//!
//! Hooks just sleep (base + random jitter) and optionally fail.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::sleep;

use keystone_core::{HookError, Module, ModuleId};

use crate::config::ModuleConfig;

pub struct SimulatedModule {
    id: ModuleId,
    dependencies: Vec<ModuleId>,
    start: Duration,
    stop: Duration,
    jitter_ms: u64,
    fail_start: bool,
    fail_stop: bool,
}

impl SimulatedModule {
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self {
            id: ModuleId::new(config.name.as_str()),
            dependencies: config
                .depends_on
                .iter()
                .map(|dep| ModuleId::new(dep.as_str()))
                .collect(),
            start: Duration::from_millis(config.start_ms),
            stop: Duration::from_millis(config.stop_ms),
            jitter_ms: config.jitter_ms,
            fail_start: config.fail_start,
            fail_stop: config.fail_stop,
        }
    }

    fn with_jitter(&self, base: Duration) -> Duration {
        if self.jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=self.jitter_ms))
    }
}

#[async_trait]
impl Module for SimulatedModule {
    fn id(&self) -> &ModuleId {
        &self.id
    }

    fn dependencies(&self) -> &[ModuleId] {
        &self.dependencies
    }

    async fn start(&self) -> Result<(), HookError> {
        let delay = self.with_jitter(self.start);
        tracing::debug!(module = %self.id, delay_ms = delay.as_millis() as u64, "simulating start");
        sleep(delay).await;
        if self.fail_start {
            return Err(HookError::new("simulated start failure"));
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), HookError> {
        let delay = self.with_jitter(self.stop);
        tracing::debug!(module = %self.id, delay_ms = delay.as_millis() as u64, "simulating shutdown");
        sleep(delay).await;
        if self.fail_stop {
            return Err(HookError::new("simulated shutdown failure"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(name: &str, deps: &[&str]) -> ModuleConfig {
        ModuleConfig {
            name: name.to_string(),
            depends_on: deps.iter().map(|d| d.to_string()).collect(),
            ..ModuleConfig::default()
        }
    }

    #[test]
    fn from_config_maps_ids() {
        let module = SimulatedModule::from_config(&config("api", &["db", "cache"]));
        assert_eq!(module.id(), &ModuleId::from("api"));
        assert_eq!(module.name(), "api");
        assert_eq!(
            module.dependencies(),
            &[ModuleId::from("db"), ModuleId::from("cache")]
        );
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let module = SimulatedModule::from_config(&ModuleConfig {
            jitter_ms: 5,
            ..config("db", &[])
        });
        let base = Duration::from_millis(10);
        for _ in 0..50 {
            let delay = module.with_jitter(base);
            assert!(delay >= base && delay <= base + Duration::from_millis(5));
        }
    }

    #[tokio::test]
    async fn failure_flags_fail_hooks() {
        let module = SimulatedModule::from_config(&ModuleConfig {
            fail_start: true,
            ..config("db", &[])
        });
        let err = module.start().await.unwrap_err();
        assert_eq!(err.message(), "simulated start failure");
        assert!(module.shutdown().await.is_ok());
    }
}
