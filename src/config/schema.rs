//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::load_balancer::ServerOptions;

/// Root configuration for a balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Upstream servers, in selection order.
    pub servers: Vec<UpstreamConfig>,

    /// Caller-side retry settings used after `NoAvailableServer`.
    pub retry: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// A single upstream server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique server identifier for logging.
    pub name: String,

    /// Base URL (e.g., "http://10.0.0.5:8080").
    pub address: String,

    /// Relative selection weight (default: 1). Zero requires `max_fails = 0`.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Failures within `fail_timeout_ms` before the server is marked down.
    /// Zero disables health tracking (default: 1).
    #[serde(default = "default_max_fails")]
    pub max_fails: u32,

    /// Failure window and minimum down period in milliseconds (default: 10000).
    #[serde(default = "default_fail_timeout_ms")]
    pub fail_timeout_ms: u64,

    /// Only used when no primary server is available.
    #[serde(default)]
    pub backup: bool,
}

impl UpstreamConfig {
    pub fn options(&self) -> ServerOptions {
        ServerOptions {
            weight: self.weight,
            max_fails: self.max_fails,
            fail_timeout: Duration::from_millis(self.fail_timeout_ms),
            is_backup: self.backup,
        }
    }
}

fn default_weight() -> u32 {
    1
}

fn default_max_fails() -> u32 {
    1
}

fn default_fail_timeout_ms() -> u64 {
    10_000
}

/// Retry configuration for callers that hit `NoAvailableServer`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts per request.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}
