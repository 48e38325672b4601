// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use crate::client::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT};
use crate::handler::VERSION_CHECK_PERIOD;

const DEFAULT_PRODUCT: &str = "update-agent";
const DEFAULT_LOG_LEVEL: &str = "info";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration of a periodic version check, usually read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckerConfig {
    /// Product name reported to the version-check service
    pub product: String,
    /// Base URL of the version-check service
    pub endpoint: String,
    /// Flags sent along with every check, on top of the host flags
    pub flags: BTreeMap<String, String>,
    /// How often to check
    pub interval: Duration,
    /// Timeout of a single check request
    pub timeout: Duration,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            product: DEFAULT_PRODUCT.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            flags: BTreeMap::new(),
            interval: VERSION_CHECK_PERIOD,
            timeout: DEFAULT_TIMEOUT,
            https_proxy: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl CheckerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let product = env::var("CHECKPOINT_PRODUCT").unwrap_or(defaults.product);
        let endpoint = env::var("CHECKPOINT_URL").unwrap_or(defaults.endpoint);
        let flags = env::var("CHECKPOINT_FLAGS")
            .map(|val| parse_flags(&val))
            .unwrap_or_default();
        let interval = env::var("CHECKPOINT_INTERVAL_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
            .map_or(defaults.interval, Duration::from_secs);
        let timeout = env::var("CHECKPOINT_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.parse::<u64>().ok())
            .map_or(defaults.timeout, Duration::from_millis);
        let https_proxy = env::var("HTTPS_PROXY").ok().filter(|val| !val.is_empty());
        let log_level = env::var("LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or(defaults.log_level);

        let config = Self {
            product,
            endpoint,
            flags,
            interval,
            timeout,
            https_proxy,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.product.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "CHECKPOINT_PRODUCT cannot be empty".to_string(),
            ));
        }

        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "CHECKPOINT_URL cannot be empty".to_string(),
            ));
        }

        if self.interval.is_zero() {
            return Err(ConfigError::Invalid(
                "Check interval must be greater than 0".to_string(),
            ));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "Check timeout must be greater than 0".to_string(),
            ));
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

/// Parses `key:value` flags. Space-separated pairs are the norm, comma
/// separated pairs are accepted too; anything else is skipped.
pub fn parse_flags(flags: &str) -> BTreeMap<String, String> {
    flags
        .replace(',', " ")
        .split_whitespace()
        .filter_map(|kv| {
            let (key, value) = kv.split_once(':')?;
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
