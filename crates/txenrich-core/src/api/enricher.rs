//! Enrichment orchestrator: the entry point for enriching transactions.
//!
//! Owns the rate limiter, executor and scheduler for one client session and
//! turns a batch of transactions into an ordered [`ResultSet`] with statistics.

use super::executor::Executor;
use super::http::HttpTransport;
use super::ratelimit::{RateLimitState, RateLimiter};
use super::retry::RetryPolicy;
use super::scheduler::{unfinished, Scheduler};
use super::transport::Transport;
use crate::config::Config;
use crate::error::{ApiError, ConfigError};
use crate::stats::RunStats;
use crate::types::{EnrichmentResult, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for the enrichment engine.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Maximum simultaneous in-flight requests
    pub concurrency_limit: usize,
    /// Minimum gap between two dispatches
    pub request_delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            request_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

impl EnrichOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency_limit: config.client.concurrency_limit,
            request_delay: config.client.request_delay(),
            timeout: config.api.timeout(),
            retry: config.retry.to_policy(),
        }
    }
}

/// Outcome of one batch.
#[derive(Debug, Clone)]
pub struct ResultSet {
    /// Exactly one result per input transaction, in input order
    pub results: Vec<EnrichmentResult>,
    pub stats: RunStats,
    /// Set when the session was halted by an authentication failure
    pub fatal: Option<ApiError>,
}

/// Concurrent, rate-limited enrichment client.
pub struct Enricher {
    scheduler: Scheduler,
}

impl Enricher {
    pub fn new(transport: Box<dyn Transport>, options: EnrichOptions) -> Self {
        let limiter = Arc::new(RateLimiter::new());
        let executor = Executor::new(transport, limiter, options.timeout);
        Self {
            scheduler: Scheduler::new(
                executor,
                options.retry,
                options.concurrency_limit,
                options.request_delay,
            ),
        }
    }

    /// Build an HTTP-backed enricher. Fails fast when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config.resolved_api_key().ok_or(ConfigError::MissingApiKey)?;
        let transport = HttpTransport::new(&config.api.base_url, &api_key, config.api.timeout())?;
        tracing::debug!("Enriching via {}", transport.endpoint());
        Ok(Self::new(Box::new(transport), EnrichOptions::from_config(config)))
    }

    /// Enrich a batch of transactions.
    pub async fn enrich_many(&self, transactions: &[Transaction]) -> ResultSet {
        self.enrich_many_with_progress(transactions, |_, _| {}).await
    }

    /// Enrich a batch, calling `on_progress(completed, total)` as each
    /// transaction reaches its terminal result.
    pub async fn enrich_many_with_progress<F>(
        &self,
        transactions: &[Transaction],
        on_progress: F,
    ) -> ResultSet
    where
        F: Fn(usize, usize),
    {
        let total = transactions.len();
        let start = Instant::now();
        let mut completed = 0usize;

        let results = self
            .scheduler
            .run_batch(transactions, |_| {
                completed += 1;
                on_progress(completed, total);
            })
            .await;

        let stats = RunStats::from_results(&results, start.elapsed())
            .with_rate_limit(self.rate_limit().await);
        tracing::debug!(
            "Enrichment complete: {} successful, {} partial, {} failed",
            stats.succeeded,
            stats.partial,
            stats.failed
        );

        ResultSet {
            results,
            stats,
            fatal: self.scheduler.halted().cloned(),
        }
    }

    /// Enrich a single transaction.
    pub async fn enrich_one(&self, transaction: &Transaction) -> EnrichmentResult {
        self.scheduler
            .run_batch(std::slice::from_ref(transaction), |_| {})
            .await
            .pop()
            .unwrap_or_else(|| unfinished(transaction, 0))
    }

    /// Last known rate-limit state of the API credential.
    pub async fn rate_limit(&self) -> RateLimitState {
        self.scheduler.executor().limiter().snapshot().await
    }

    /// Whether an authentication failure has halted this session.
    pub fn is_halted(&self) -> bool {
        self.scheduler.halted().is_some()
    }
}
