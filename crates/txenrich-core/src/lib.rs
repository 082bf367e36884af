//! txenrich core: embeddable transaction enrichment client.
//!
//! Sends raw bank transaction descriptions to a remote enrichment service and
//! returns structured merchant, category, location, payment-processor,
//! peer-to-peer and subscription data.
//!
//! # Architecture
//!
//! ```text
//! Transactions → Scheduler (bounded window, admission queue)
//!              → RateLimiter (token bucket from response headers)
//!              → Executor (HTTP call, classification) → RetryPolicy
//!              → ResultSet (input order) + RunStats
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use txenrich_core::{Config, Enricher, Transaction, TransactionType};
//!
//! #[tokio::main]
//! async fn main() -> txenrich_core::Result<()> {
//!     let config = Config::load()?;
//!     let enricher = Enricher::from_config(&config)?;
//!
//!     let tx = Transaction::new("SQ *VERVE ROASTERS gosq.com CA", "US", TransactionType::Expense)?;
//!     let result = enricher.enrich_one(&tx).await;
//!     println!("{:?}", result.payload().and_then(|p| p.merchant_name()));
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod api;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod payload;
pub mod stats;
pub mod types;

// Re-exports for convenient access
pub use api::{EnrichOptions, Enricher, RateLimitState, ResultSet, RetryPolicy};
pub use config::Config;
pub use error::{ApiError, ConfigError, ErrorKind, InputError, Result, TxenrichError};
pub use input::{load_csv, LoadedTransactions, RejectedRow};
pub use output::{OutputFormat, OutputWriter, ResultStore};
pub use payload::EnrichmentPayload;
pub use stats::RunStats;
pub use types::{EnrichmentResult, Outcome, Transaction, TransactionType};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
