//! Retry policy for failed enrichment requests.
//!
//! Classifies which failures are transient and computes jittered exponential
//! backoff. A 429 carrying a server-provided wait is honoured without jitter,
//! up to [`MAX_SERVER_WAIT`].

use super::ratelimit::MAX_SERVER_WAIT;
use crate::error::{ApiError, ErrorKind};
use rand::Rng;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-admit the transaction once this much time has passed.
    RetryAfter(Duration),
    /// The failure is terminal for this transaction.
    GiveUp,
}

/// Retry parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total calls allowed per transaction, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Backoff is scaled by a uniform factor in `[1 - jitter, 1 + jitter]`
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Decide whether to retry after `attempt` calls have been made (1-based).
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> RetryDecision {
        self.should_retry_with(error, attempt, &mut rand::thread_rng())
    }

    /// Same as [`should_retry`](Self::should_retry) with a caller-supplied RNG.
    pub fn should_retry_with<R: Rng + ?Sized>(
        &self,
        error: &ApiError,
        attempt: u32,
        rng: &mut R,
    ) -> RetryDecision {
        if attempt >= self.max_attempts || !is_retryable(error) {
            return RetryDecision::GiveUp;
        }

        if let ApiError::RateLimited {
            retry_after: Some(wait),
            ..
        } = error
        {
            return RetryDecision::RetryAfter((*wait).min(MAX_SERVER_WAIT));
        }

        let delay = backoff_duration(
            attempt.saturating_sub(1),
            self.base_delay.as_millis() as u64,
            self.max_delay.as_millis() as u64,
        );
        RetryDecision::RetryAfter(apply_jitter(delay, self.jitter, rng))
    }
}

/// Determine whether a failure is worth retrying.
///
/// Retryable: rate limits (429), server errors (5xx), network failures and timeouts.
/// Non-retryable: auth failures, other 4xx, malformed payloads.
pub fn is_retryable(error: &ApiError) -> bool {
    matches!(
        error.kind(),
        ErrorKind::RateLimited | ErrorKind::ServerError | ErrorKind::NetworkError
    )
}

/// Calculate exponential backoff for the given zero-based retry number.
///
/// Uses `base_delay * 2^retry` capped at `max_delay_ms`.
pub fn backoff_duration(retry: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(retry));
    Duration::from_millis(delay.min(max_delay_ms))
}

fn apply_jitter<R: Rng + ?Sized>(delay: Duration, jitter: f64, rng: &mut R) -> Duration {
    if jitter <= 0.0 {
        return delay;
    }
    let factor = rng.gen_range((1.0 - jitter)..=(1.0 + jitter));
    delay.mul_f64(factor.max(0.0))
}
