//! Configuration loading and validation.
//!
//! # Design Decisions
//! - serde handles syntax; `validate_config` handles semantics
//! - Returns all validation errors, not just the first
//! - Dependency problems (unknown ids, cycles) are left to the registry
//!   preflight so `check` reports them in one place

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use keystone_core::LifecycleConfig;

/// Whole config file: a `[lifecycle]` table and `[[module]]` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeystoneConfig {
    pub lifecycle: LifecycleConfig,

    #[serde(rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

/// One simulated module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub name: String,
    pub depends_on: Vec<String>,
    /// Base duration of the start hook.
    pub start_ms: u64,
    /// Base duration of the shutdown hook.
    pub stop_ms: u64,
    /// Up to this many extra milliseconds, drawn per call.
    pub jitter_ms: u64,
    pub fail_start: bool,
    pub fail_stop: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", validation_list(.0))]
    Validation(Vec<ValidationError>),
}

fn validation_list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no modules configured")]
    NoModules,

    #[error("module #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("module {0} is defined more than once")]
    DuplicateModule(String),

    #[error("module {0} depends on itself")]
    SelfDependency(String),

    #[error("lifecycle.hook_timeout_ms must be greater than 0")]
    ZeroHookTimeout,

    #[error("lifecycle.wait_timeout_ms must be greater than 0")]
    ZeroWaitTimeout,
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<KeystoneConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<KeystoneConfig, ConfigError> {
    let config: KeystoneConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn validate_config(config: &KeystoneConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.modules.is_empty() {
        errors.push(ValidationError::NoModules);
    }

    let mut seen = HashSet::new();
    for (index, module) in config.modules.iter().enumerate() {
        if module.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName { index });
            continue;
        }
        if !seen.insert(module.name.as_str()) {
            errors.push(ValidationError::DuplicateModule(module.name.clone()));
        }
        if module.depends_on.iter().any(|dep| dep == &module.name) {
            errors.push(ValidationError::SelfDependency(module.name.clone()));
        }
    }

    if config.lifecycle.hook_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroHookTimeout);
    }
    if config.lifecycle.wait_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroWaitTimeout);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
