//! Error types for the transaction enrichment client.
//!
//! Errors are split by concern: configuration, input loading, and the
//! per-request API failures that drive retry and cancellation decisions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for txenrich operations.
#[derive(Error, Debug)]
pub enum TxenrichError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Input loading errors
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// No API key could be resolved from config, environment or flags
    #[error("API key not set. Set the TRIQAI_API_KEY env var or pass --api-key.")]
    MissingApiKey,

    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Errors raised while loading input transactions.
#[derive(Error, Debug)]
pub enum InputError {
    /// Input file does not exist
    #[error("Input file not found: {0}")]
    FileNotFound(PathBuf),

    /// The CSV reader failed (I/O or malformed structure)
    #[error("Failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    /// A transaction field failed validation
    #[error("Invalid {field}: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Coarse classification of a failed enrichment request.
///
/// This is what gets recorded on a failed result and aggregated into run
/// statistics. Use [`ApiError`] when the full failure detail is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Credential rejected (or credits exhausted); halts the whole session
    Auth,
    /// HTTP 429
    RateLimited,
    /// HTTP 5xx
    ServerError,
    /// Any other HTTP 4xx
    ClientError,
    /// Connection failure or timeout
    NetworkError,
    /// 2xx with a body that does not match the payload contract
    MalformedResponse,
    /// The worker task died before producing a result
    Internal,
}

impl ErrorKind {
    /// Stable snake_case identifier, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::ClientError => "client_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::MalformedResponse => "malformed_response",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of a single enrichment request.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 401/403 (and 402 insufficient credits). Retrying wastes quota.
    #[error("Authentication failed (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    /// 429. `retry_after` is derived from the reset header or `Retry-After`.
    #[error("Rate limited: {message}")]
    RateLimited {
        retry_after: Option<Duration>,
        message: String,
    },

    /// 5xx
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// Other 4xx: the request itself was rejected
    #[error("Request rejected (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    /// Connection failure or timeout
    #[error("Network error: {message}")]
    Network { message: String, timed_out: bool },

    /// Successful status but the body could not be decoded or validated
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },
}

impl ApiError {
    /// Classification used by the retry policy and run statistics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Auth { .. } => ErrorKind::Auth,
            ApiError::RateLimited { .. } => ErrorKind::RateLimited,
            ApiError::Server { .. } => ErrorKind::ServerError,
            ApiError::Client { .. } => ErrorKind::ClientError,
            ApiError::Network { .. } => ErrorKind::NetworkError,
            ApiError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// HTTP status code, when the failure came from an HTTP response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Auth { status, .. }
            | ApiError::Server { status, .. }
            | ApiError::Client { status, .. } => Some(*status),
            ApiError::RateLimited { .. } => Some(429),
            ApiError::Network { .. } | ApiError::MalformedResponse { .. } => None,
        }
    }

    /// Whether this failure should stop every further call for the session.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, ApiError::Auth { .. })
    }
}

/// Failure below the HTTP layer: the request never produced a response.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Connect(String),
}

impl From<TransportError> for ApiError {
    fn from(error: TransportError) -> Self {
        let timed_out = matches!(error, TransportError::Timeout);
        ApiError::Network {
            message: error.to_string(),
            timed_out,
        }
    }
}

/// Convenience type alias for txenrich results.
pub type Result<T> = std::result::Result<T, TxenrichError>;
