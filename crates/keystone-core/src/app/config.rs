//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where shutdown looks up a module's dependents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownOrder {
    /// Dependents recorded while starting (the dependent index). A module
    /// that was never started through the orchestrator has no recorded
    /// dependents.
    #[default]
    Discovered,

    /// Dependents from the static declarations of every registered module.
    Declared,
}

/// What to do when a module's own hook returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookErrorPolicy {
    /// Fail the branch; everything waiting on it fails too.
    #[default]
    Propagate,

    /// Emit the error as an event and carry on as if the hook succeeded.
    Suppress,
}

/// Orchestrator settings. Every field has a default so partial configs work.
///
/// Durations are in milliseconds; `None` means no limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Limit for a single `start`/`shutdown` hook invocation.
    pub hook_timeout_ms: Option<u64>,

    /// Limit for waiting on dependencies (start) or dependents (shutdown).
    pub wait_timeout_ms: Option<u64>,

    pub shutdown_order: ShutdownOrder,

    pub hook_errors: HookErrorPolicy,
}

impl LifecycleConfig {
    pub fn hook_timeout(&self) -> Option<Duration> {
        self.hook_timeout_ms.map(Duration::from_millis)
    }

    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }

    pub fn with_hook_timeout(mut self, timeout: Duration) -> Self {
        self.hook_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_shutdown_order(mut self, order: ShutdownOrder) -> Self {
        self.shutdown_order = order;
        self
    }

    pub fn with_hook_errors(mut self, policy: HookErrorPolicy) -> Self {
        self.hook_errors = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_no_limits() {
        let config = LifecycleConfig::default();
        assert_eq!(config.hook_timeout(), None);
        assert_eq!(config.wait_timeout(), None);
        assert_eq!(config.shutdown_order, ShutdownOrder::Discovered);
        assert_eq!(config.hook_errors, HookErrorPolicy::Propagate);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: LifecycleConfig =
            serde_json::from_str(r#"{ "hook_timeout_ms": 250, "shutdown_order": "declared" }"#)
                .unwrap();
        assert_eq!(config.hook_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.wait_timeout(), None);
        assert_eq!(config.shutdown_order, ShutdownOrder::Declared);
        assert_eq!(config.hook_errors, HookErrorPolicy::Propagate);
    }

    #[test]
    fn builder_methods() {
        let config = LifecycleConfig::default()
            .with_hook_timeout(Duration::from_secs(1))
            .with_wait_timeout(Duration::from_secs(2))
            .with_hook_errors(HookErrorPolicy::Suppress);
        assert_eq!(config.hook_timeout_ms, Some(1000));
        assert_eq!(config.wait_timeout_ms, Some(2000));
        assert_eq!(config.hook_errors, HookErrorPolicy::Suppress);
    }
}
