// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{DEFAULT_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS};
use crate::engine::ExecutionMode;
use crate::errors::{ConfigError, FailureStrategy};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Runner configuration.
///
/// Controls how step batches are executed and how failures inside a batch are reported.
/// Owner open/close semantics are fixed and not configurable.
///
/// # Fields
/// * `execution_mode` - Run targets within a step concurrently or one at a time (optional, defaults to concurrent)
/// * `failure_strategy` - Raise on any failed target or return the successful subset (optional, defaults to strict)
/// * `executor_options` - Executor tuning (optional)
///
/// # Example
/// ```yaml
/// execution_mode: concurrent
/// failure_strategy: strict
/// executor_options:
///   poll_interval_ms: 10
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub failure_strategy: FailureStrategy,
    #[serde(default)]
    pub executor_options: ExecutorOptions,
}

/// Executor tuning options.
///
/// # Fields
/// * `poll_interval_ms` - How often the cooperative wait primitive checks for cancellation (optional)
#[derive(Debug, Default, Deserialize)]
pub struct ExecutorOptions {
    pub poll_interval_ms: Option<u64>,
}

impl ExecutorOptions {
    /// Configured poll interval, or the built-in default.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS))
    }
}

/// Parse a config from YAML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    // An empty document means "all defaults"
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Load a config from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&content)
}

/// Load a config from a YAML file and check its values are in range
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let cfg = load_config(path)?;

    if let Some(ms) = cfg.executor_options.poll_interval_ms {
        if ms == 0 || ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms must be between 1 and {}, got {}",
                MAX_POLL_INTERVAL_MS, ms
            )));
        }
    }

    Ok(cfg)
}
