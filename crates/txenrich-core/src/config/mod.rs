//! Configuration management for txenrich.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults, then environment variables are layered on top.

mod types;
mod validate;

pub use types::*;

use crate::api::resolve_env_var;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "TRIQAI_API_KEY";
/// Environment override for `client.concurrency_limit`.
pub const MAX_CONCURRENT_ENV: &str = "MAX_CONCURRENT_REQUESTS";
/// Environment override for `client.request_delay_ms`, in (fractional) seconds.
pub const REQUEST_DELAY_ENV: &str = "REQUEST_DELAY";

/// Root configuration structure for txenrich.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote service settings
    pub api: ApiConfig,

    /// Concurrency and pacing
    pub client: ClientConfig,

    /// Retry settings
    pub retry: RetryConfig,

    /// Output settings
    pub output: OutputConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location, then apply environment overrides.
    ///
    /// Uses defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories:
    /// - macOS: ~/Library/Application Support/com.txenrich.txenrich/config.toml
    /// - Linux: ~/.config/txenrich/config.toml
    /// - Windows: C:\Users\<User>\AppData\Roaming\txenrich\config\config.toml
    ///
    /// Falls back to ~/.txenrich/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "txenrich", "txenrich")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".txenrich").join("config.toml")
            })
    }

    /// Apply `TRIQAI_API_KEY`, `MAX_CONCURRENT_REQUESTS` and `REQUEST_DELAY`.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    pub(crate) fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = lookup(API_KEY_ENV) {
            self.api.api_key = key;
        }
        if let Some(raw) = lookup(MAX_CONCURRENT_ENV) {
            self.client.concurrency_limit = raw.parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "{MAX_CONCURRENT_ENV} must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(raw) = lookup(REQUEST_DELAY_ENV) {
            let secs: f64 = raw
                .parse()
                .ok()
                .filter(|s: &f64| s.is_finite() && *s >= 0.0)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "{REQUEST_DELAY_ENV} must be a non-negative number of seconds, got '{raw}'"
                    ))
                })?;
            self.client.request_delay_ms = (secs * 1000.0).round() as u64;
        }
        Ok(())
    }

    /// The API key with `${ENV_VAR}` references resolved.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_env_var(self.api.api_key.trim())
    }

    /// Get the resolved output directory path (with ~ expansion).
    pub fn output_dir(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.output.dir);
        PathBuf::from(expanded.into_owned())
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://api.triqai.com");
        assert_eq!(config.api.timeout(), Duration::from_secs(30));
        assert_eq!(config.client.concurrency_limit, 5);
        assert_eq!(config.client.request_delay(), Duration::from_millis(100));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.output.format, "json");
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[api]"));
        assert!(toml.contains("[client]"));
        assert!(toml.contains("[retry]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client]\nconcurrency_limit = 2\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.client.concurrency_limit, 2);
        assert_eq!(config.client.request_delay_ms, 100);
        assert_eq!(config.retry.base_delay_ms, 500);
    }

    #[test]
    fn test_invalid_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[client\nconcurrency_limit = ").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides_from(env(&[
                (API_KEY_ENV, "sk_test_123"),
                (MAX_CONCURRENT_ENV, "8"),
                (REQUEST_DELAY_ENV, "0.25"),
            ]))
            .unwrap();

        assert_eq!(config.resolved_api_key().as_deref(), Some("sk_test_123"));
        assert_eq!(config.client.concurrency_limit, 8);
        assert_eq!(config.client.request_delay_ms, 250);
    }

    #[test]
    fn test_env_overrides_reject_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_overrides_from(env(&[(MAX_CONCURRENT_ENV, "many")]))
            .unwrap_err();
        assert!(err.to_string().contains(MAX_CONCURRENT_ENV));

        let err = config
            .apply_overrides_from(env(&[(REQUEST_DELAY_ENV, "-1")]))
            .unwrap_err();
        assert!(err.to_string().contains(REQUEST_DELAY_ENV));
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut config = Config::default();
        config
            .apply_overrides_from(env(&[(MAX_CONCURRENT_ENV, "  ")]))
            .unwrap();
        assert_eq!(config.client.concurrency_limit, 5);
    }

    #[test]
    fn test_literal_api_key() {
        let mut config = Config::default();
        config.api.api_key = "  sk_live_abc ".to_string();
        assert_eq!(config.resolved_api_key().as_deref(), Some("sk_live_abc"));

        config.api.api_key = String::new();
        assert_eq!(config.resolved_api_key(), None);
    }

    #[test]
    fn test_output_dir_expands_tilde() {
        let mut config = Config::default();
        config.output.dir = "~/txenrich-out".to_string();
        let dir = config.output_dir();
        assert!(!dir.to_string_lossy().starts_with('~'));
        assert!(dir.ends_with("txenrich-out"));
    }

    #[test]
    fn test_retry_config_to_policy() {
        let policy = RetryConfig::default().to_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }
}
