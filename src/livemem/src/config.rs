//! Cache configuration
//!
//! Tunables for the refresh loop and retention policy. Loadable from TOML; every field has
//! a default, so an empty document is a valid configuration.

use crate::error::{LiveMemError, Result};
use crate::retention::RetentionPolicy;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay between refresh cycles
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 50;

/// Default idle time before a block may be evicted, when retention is enabled
pub const DEFAULT_IDLE_THRESHOLD_MS: u64 = 3000;

/// Reads slower than this are logged
pub const DEFAULT_SLOW_READ_WARN_MS: u64 = 250;

/// A read still outstanding after this long is abandoned for the cycle
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveMemoryConfig {
    pub refresh_interval_ms: u64,
    pub slow_read_warn_ms: u64,
    pub read_timeout_ms: u64,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub idle_threshold_ms: u64,
}

impl Default for LiveMemoryConfig {
    fn default() -> Self {
        LiveMemoryConfig {
            refresh_interval_ms: DEFAULT_REFRESH_INTERVAL_MS,
            slow_read_warn_ms: DEFAULT_SLOW_READ_WARN_MS,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            retention: RetentionConfig::default(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        RetentionConfig {
            enabled: false,
            idle_threshold_ms: DEFAULT_IDLE_THRESHOLD_MS,
        }
    }
}

impl LiveMemoryConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: LiveMemoryConfig =
            toml::from_str(contents).map_err(|e| LiveMemError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            return Err(LiveMemError::Config(
                "refresh_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(LiveMemError::Config(
                "read_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.retention.enabled && self.retention.idle_threshold_ms == 0 {
            return Err(LiveMemError::Config(
                "retention.idle_threshold_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Set the delay between cycles, truncated to whole milliseconds
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval_ms = millis(interval);
        self
    }

    /// Set the read timeout, truncated to whole milliseconds
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = millis(timeout);
        self
    }

    /// Enable idle eviction after `threshold`, truncated to whole milliseconds
    pub fn with_idle_eviction(mut self, threshold: Duration) -> Self {
        self.retention = RetentionConfig {
            enabled: true,
            idle_threshold_ms: millis(threshold),
        };
        self
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn slow_read_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_read_warn_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        if self.retention.enabled {
            RetentionPolicy::evict_idle(Duration::from_millis(self.retention.idle_threshold_ms))
        } else {
            RetentionPolicy::KeepForever
        }
    }
}

// Saturates instead of wrapping for durations past u64::MAX milliseconds
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
