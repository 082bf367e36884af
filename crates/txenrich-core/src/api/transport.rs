//! Transport trait and wire request/response types.
//!
//! The executor talks to the enrichment service only through [`Transport`],
//! so the HTTP client can be swapped for a scripted mock in tests.

use crate::error::TransportError;
use crate::types::{Transaction, TransactionType};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::Serialize;

/// Path of the enrichment endpoint, relative to the base URL.
pub const ENRICH_PATH: &str = "/v1/transactions/enrich";

/// JSON body of an enrichment call. The transaction comment is never sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichRequest {
    pub title: String,
    pub country: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
}

impl From<&Transaction> for EnrichRequest {
    fn from(tx: &Transaction) -> Self {
        Self {
            title: tx.title().to_string(),
            country: tx.country().to_string(),
            kind: tx.kind(),
        }
    }
}

/// A raw HTTP response: status, headers and unparsed body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Sends one enrichment request and returns whatever the server answered.
///
/// Uses `async_trait` so the executor can hold a `Box<dyn Transport>`.
/// Implementations must not interpret the status code; classification is
/// the executor's job.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport name for logging (e.g., "http", "mock").
    fn name(&self) -> &str;

    async fn post_enrich(&self, request: &EnrichRequest)
        -> Result<TransportResponse, TransportError>;
}

/// Resolve `${ENV_VAR}` references in config strings.
pub fn resolve_env_var(value: &str) -> Option<String> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
