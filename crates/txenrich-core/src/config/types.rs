//! Sub-configuration structs and their defaults.

use crate::api::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the enrichment service
    pub base_url: String,

    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,

    /// Per-request timeout
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.triqai.com".to_string(),
            api_key: "${TRIQAI_API_KEY}".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Request scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Maximum simultaneous in-flight requests
    pub concurrency_limit: usize,

    /// Minimum gap between two dispatches
    pub request_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            request_delay_ms: 100,
        }
    }
}

impl ClientConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Retry settings for transient failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total calls per transaction, including the first
    pub max_attempts: u32,

    /// Backoff before the first retry (doubles each time)
    pub base_delay_ms: u64,

    /// Backoff ceiling
    pub max_delay_ms: u64,

    /// Random spread applied to backoff, as a fraction
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for result and summary files
    pub dir: String,

    /// Default output format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "output".to_string(),
            format: "json".to_string(),
            pretty: true,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
