//! Client-side request orchestration for the enrichment service.
//!
//! Leaves first: a header-driven [`RateLimiter`], a [`RetryPolicy`], the
//! single-call [`Executor`], the [`Scheduler`] that bounds concurrency, and
//! the [`Enricher`] façade tying them together.

pub(crate) mod enricher;
pub(crate) mod executor;
pub(crate) mod http;
#[cfg(test)]
pub(crate) mod mock;
pub(crate) mod ratelimit;
pub(crate) mod retry;
pub(crate) mod scheduler;
pub(crate) mod transport;

pub use enricher::{EnrichOptions, Enricher, ResultSet};
pub use executor::Executor;
pub use http::HttpTransport;
pub use ratelimit::{RateLimitHeaders, RateLimitState, RateLimiter};
pub use retry::{RetryDecision, RetryPolicy};
pub use scheduler::{DispatchPacer, Scheduler};
pub use transport::{resolve_env_var, EnrichRequest, Transport, TransportResponse};
