//! Token-bucket rate limiting driven by the server's response headers.
//!
//! The server is the source of truth: every response overwrites whatever the
//! headers report. Between responses the limiter keeps a local estimate,
//! decrementing `remaining` optimistically on each granted acquisition.

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";
pub const BURST_HEADER: &str = "x-ratelimit-burst";
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Added on top of the advertised reset to absorb clock skew between us and the server.
const RESET_SLACK: Duration = Duration::from_millis(50);

/// Longest wait a server header can impose; larger values are clamped.
pub const MAX_SERVER_WAIT: Duration = Duration::from_secs(60 * 60);

/// Rate-limit information parsed from one response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
    pub burst: Option<u32>,
    /// `Retry-After` in seconds (sent with 429 and 503)
    pub retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let number = |name: &str| text(name).and_then(|v| v.parse::<u32>().ok());

        Self {
            limit: number(LIMIT_HEADER),
            remaining: number(REMAINING_HEADER),
            reset: text(RESET_HEADER).and_then(parse_reset),
            burst: number(BURST_HEADER),
            retry_after: text(RETRY_AFTER_HEADER)
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| Duration::from_secs(secs).min(MAX_SERVER_WAIT)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// How long the server asked us to back off, measured from `now`.
    ///
    /// Prefers the reset timestamp over `Retry-After`. Never exceeds [`MAX_SERVER_WAIT`].
    pub fn retry_after_from(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.reset {
            Some(reset) => Some(wait_until(reset, now)),
            None => self.retry_after.map(|d| d.min(MAX_SERVER_WAIT)),
        }
    }
}

/// Time from `now` until `reset`, zero if it has passed, clamped to [`MAX_SERVER_WAIT`].
fn wait_until(reset: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .min(MAX_SERVER_WAIT)
}

/// Accepts ISO-8601 / RFC 3339 timestamps, or integer Unix seconds.
fn parse_reset(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            value
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        })
}

/// Last known token-bucket state for the API credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateLimitState {
    /// Sustained refill rate (requests per second)
    pub limit: Option<u32>,
    /// Tokens currently available; `None` until the server has told us
    pub remaining: Option<u32>,
    /// When the bucket refills
    pub reset: Option<DateTime<Utc>>,
    /// Bucket capacity
    pub burst: Option<u32>,
}

#[derive(Debug, Default)]
struct Bucket {
    state: RateLimitState,
    /// `state.reset` translated onto the monotonic clock
    reset_at: Option<Instant>,
}

impl Bucket {
    fn take(&mut self, now: Instant) -> Duration {
        match self.state.remaining {
            // Nothing reported yet: assume tokens are available.
            None => Duration::ZERO,
            Some(n) if n > 0 => {
                self.state.remaining = Some(n - 1);
                Duration::ZERO
            }
            Some(_) => match self.reset_at {
                Some(at) if at > now => at - now,
                _ => {
                    let refill = self.state.burst.or(self.state.limit);
                    self.state.remaining = refill.map(|n| n.saturating_sub(1));
                    self.state.reset = None;
                    self.reset_at = None;
                    Duration::ZERO
                }
            },
        }
    }

    fn apply(&mut self, headers: &RateLimitHeaders, now: Instant, now_utc: DateTime<Utc>) {
        if let Some(limit) = headers.limit {
            self.state.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            self.state.remaining = Some(remaining);
        }
        if let Some(burst) = headers.burst {
            self.state.burst = Some(burst);
        }

        let reset = headers.reset.or_else(|| {
            headers
                .retry_after
                .map(|d| d.min(MAX_SERVER_WAIT))
                .and_then(|d| TimeDelta::from_std(d).ok())
                .and_then(|d| now_utc.checked_add_signed(d))
        });
        if let Some(reset) = reset {
            let until = wait_until(reset, now_utc) + RESET_SLACK;
            self.state.reset = Some(reset);
            self.reset_at = Some(now.checked_add(until).unwrap_or(now));
        }
    }
}

/// Shared gate in front of every outgoing request.
#[derive(Debug, Default)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take a token.
    ///
    /// Returns `Duration::ZERO` when the request may be sent now (the local
    /// estimate has already been decremented), otherwise how long to wait
    /// before trying again.
    pub async fn acquire(&self) -> Duration {
        self.acquire_at(Instant::now()).await
    }

    pub(crate) async fn acquire_at(&self, now: Instant) -> Duration {
        self.bucket.lock().await.take(now)
    }

    /// Overwrite the known state with whatever the response headers report.
    ///
    /// Latest response wins; absent headers leave the field untouched.
    pub async fn update(&self, headers: &RateLimitHeaders) {
        if headers.is_empty() {
            return;
        }
        let mut bucket = self.bucket.lock().await;
        bucket.apply(headers, Instant::now(), Utc::now());
        tracing::debug!(
            "Rate limit: {:?}/{:?} remaining (burst {:?}, reset {:?})",
            bucket.state.remaining,
            bucket.state.limit,
            bucket.state.burst,
            bucket.state.reset
        );
    }

    /// Copy of the current state, for reporting.
    pub async fn snapshot(&self) -> RateLimitState {
        self.bucket.lock().await.state.clone()
    }
}
