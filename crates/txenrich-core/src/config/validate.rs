//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

/// Upper bound for `api.timeout_ms` (10 minutes).
pub const MAX_TIMEOUT_MS: u64 = 600_000;
/// Upper bound for `client.request_delay_ms` (1 minute).
pub const MAX_REQUEST_DELAY_MS: u64 = 60_000;
/// Upper bound for `retry.max_delay_ms` (1 hour).
pub const MAX_RETRY_DELAY_MS: u64 = 3_600_000;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "api.base_url must not be empty".into(),
            ));
        }
        if self.api.timeout_ms == 0 || self.api.timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::ValidationError(format!(
                "api.timeout_ms must be in 1..={MAX_TIMEOUT_MS}"
            )));
        }
        if self.client.request_delay_ms > MAX_REQUEST_DELAY_MS {
            return Err(ConfigError::ValidationError(format!(
                "client.request_delay_ms must be <= {MAX_REQUEST_DELAY_MS}"
            )));
        }
        if self.client.concurrency_limit == 0 {
            return Err(ConfigError::ValidationError(
                "client.concurrency_limit must be > 0".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        if self.retry.max_delay_ms > MAX_RETRY_DELAY_MS {
            return Err(ConfigError::ValidationError(format!(
                "retry.max_delay_ms must be <= {MAX_RETRY_DELAY_MS}"
            )));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.retry.jitter) {
            return Err(ConfigError::ValidationError(
                "retry.jitter must be in [0.0, 1.0)".into(),
            ));
        }
        if !matches!(self.output.format.as_str(), "json" | "jsonl") {
            return Err(ConfigError::ValidationError(format!(
                "output.format must be \"json\" or \"jsonl\", got \"{}\"",
                self.output.format
            )));
        }
        Ok(())
    }
}
