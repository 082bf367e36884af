//! Single enrichment call: send, feed the rate limiter, classify.

use super::ratelimit::{RateLimitHeaders, RateLimiter};
use super::transport::{EnrichRequest, Transport, TransportResponse};
use crate::error::ApiError;
use crate::payload::{EnrichResponse, ErrorResponse};
use crate::types::{Enriched, Transaction};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Longest raw (non-JSON) error body kept in a failure message.
const MAX_RAW_ERROR_CHARS: usize = 200;

/// Performs one HTTP call per [`send`](Executor::send).
pub struct Executor {
    transport: Box<dyn Transport>,
    limiter: Arc<RateLimiter>,
    timeout: Duration,
}

impl Executor {
    pub fn new(transport: Box<dyn Transport>, limiter: Arc<RateLimiter>, timeout: Duration) -> Self {
        Self {
            transport,
            limiter,
            timeout,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Send one transaction and classify the outcome.
    ///
    /// The rate limiter is updated from every response, whatever its status.
    pub async fn send(&self, tx: &Transaction) -> Result<Enriched, ApiError> {
        let request = EnrichRequest::from(tx);

        let response =
            match tokio::time::timeout(self.timeout, self.transport.post_enrich(&request)).await {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(ApiError::Network {
                        message: format!("timed out after {}ms", self.timeout.as_millis()),
                        timed_out: true,
                    })
                }
            };

        let mut headers = RateLimitHeaders::from_headers(&response.headers);
        if response.status == 429 && headers.remaining.is_none() {
            // A 429 means the bucket is empty even if the server didn't say so.
            headers.remaining = Some(0);
        }
        self.limiter.update(&headers).await;

        let result = classify(&response, &headers, Utc::now());
        if let Err(e) = &result {
            tracing::debug!("{} call for '{}' failed: {e}", self.transport.name(), tx.title());
        }
        result
    }
}

/// Map a raw response onto the success payload or an [`ApiError`].
pub(crate) fn classify(
    response: &TransportResponse,
    headers: &RateLimitHeaders,
    now: DateTime<Utc>,
) -> Result<Enriched, ApiError> {
    let status = response.status;

    if (200..300).contains(&status) {
        let envelope: EnrichResponse =
            serde_json::from_slice(&response.body).map_err(|e| ApiError::MalformedResponse {
                message: format!("Failed to parse enrichment response: {e}"),
            })?;
        return Ok(Enriched {
            payload: envelope.data,
            partial: envelope.partial,
            request_id: envelope.meta.and_then(|m| m.request_id),
        });
    }

    let message = error_message(&response.body, status);
    Err(match status {
        401..=403 => ApiError::Auth { status, message },
        429 => ApiError::RateLimited {
            retry_after: headers.retry_after_from(now),
            message,
        },
        500..=599 => ApiError::Server { status, message },
        400..=499 => ApiError::Client { status, message },
        _ => ApiError::MalformedResponse {
            message: format!("unexpected HTTP {status}: {message}"),
        },
    })
}

/// Prefer the service's `{"error": {...}}` message, fall back to the raw body.
fn error_message(body: &[u8], status: u16) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorResponse>(body) {
        return match parsed.error.code {
            Some(code) => format!("{} ({code})", parsed.error.message),
            None => parsed.error.message,
        };
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        text.chars().take(MAX_RAW_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{self, MockTransport};
    use crate::error::{ErrorKind, TransportError};
    use crate::types::TransactionType;

    fn verve_tx() -> Transaction {
        Transaction::new("SQ *VERVE ROASTERS gosq.com CA", "US", TransactionType::Expense)
            .unwrap()
    }

    fn executor(transport: MockTransport) -> Executor {
        Executor::new(
            Box::new(transport),
            Arc::new(RateLimiter::new()),
            Duration::from_secs(5),
        )
    }

    fn classify_status(status: u16) -> ApiError {
        let resp = mock::error(status, "nope");
        classify(&resp, &RateLimitHeaders::default(), Utc::now()).unwrap_err()
    }

    #[tokio::test]
    async fn test_send_success_decodes_payload() {
        let transport = MockTransport::always(mock::ok_verve());
        let handle = transport.handle();
        let enriched = executor(transport).send(&verve_tx()).await.unwrap();

        assert_eq!(enriched.payload.merchant_name(), Some("Verve Coffee Roasters"));
        assert!(!enriched.partial);
        assert_eq!(enriched.request_id.as_deref(), Some("req_test"));
        assert_eq!(handle.calls(), 1);
        assert_eq!(handle.titles(), vec!["SQ *VERVE ROASTERS gosq.com CA"]);
    }

    #[tokio::test]
    async fn test_send_updates_limiter_on_error_responses() {
        let resp = mock::with_headers(
            mock::error(500, "boom"),
            &[("X-RateLimit-Limit", "5"), ("X-RateLimit-Remaining", "3")],
        );
        let exec = executor(MockTransport::always(resp));
        let err = exec.send(&verve_tx()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ServerError);
        let state = exec.limiter().snapshot().await;
        assert_eq!(state.limit, Some(5));
        assert_eq!(state.remaining, Some(3));
    }

    #[tokio::test]
    async fn test_send_timeout_is_network_error() {
        let transport = MockTransport::always(mock::ok_verve()).with_delay(Duration::from_secs(5));
        let exec = Executor::new(
            Box::new(transport),
            Arc::new(RateLimiter::new()),
            Duration::from_millis(50),
        );
        let err = exec.send(&verve_tx()).await.unwrap_err();
        assert!(
            matches!(err, ApiError::Network { timed_out: true, .. }),
            "got {err:?}"
        );
    }

    #[tokio::test]
    async fn test_send_connect_failure_is_network_error() {
        let transport =
            MockTransport::new(|_, _| Err(TransportError::Connect("connection refused".into())));
        let err = executor(transport).send(&verve_tx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkError);
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(classify_status(401).kind(), ErrorKind::Auth);
        assert_eq!(classify_status(402).kind(), ErrorKind::Auth);
        assert_eq!(classify_status(403).kind(), ErrorKind::Auth);
        assert_eq!(classify_status(429).kind(), ErrorKind::RateLimited);
        assert_eq!(classify_status(400).kind(), ErrorKind::ClientError);
        assert_eq!(classify_status(422).kind(), ErrorKind::ClientError);
        assert_eq!(classify_status(500).kind(), ErrorKind::ServerError);
        assert_eq!(classify_status(503).kind(), ErrorKind::ServerError);
    }

    #[test]
    fn test_classify_uses_error_body_message() {
        let err = classify_status(422);
        assert_eq!(
            err,
            ApiError::Client {
                status: 422,
                message: "nope (E422)".to_string()
            }
        );
    }

    #[test]
    fn test_classify_raw_body_fallback() {
        let resp = mock::response(502, "<html>Bad Gateway</html>");
        let err = classify(&resp, &RateLimitHeaders::default(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("Bad Gateway"));

        let resp = mock::response(503, "");
        let err = classify(&resp, &RateLimitHeaders::default(), Utc::now()).unwrap_err();
        assert!(err.to_string().contains("HTTP 503"));
    }

    #[test]
    fn test_classify_rate_limited_carries_wait() {
        let now = Utc::now();
        let headers = RateLimitHeaders {
            reset: Some(now + chrono::TimeDelta::seconds(3)),
            ..Default::default()
        };
        let err = classify(&mock::error(429, "slow down"), &headers, now).unwrap_err();
        assert_eq!(
            err,
            ApiError::RateLimited {
                retry_after: Some(Duration::from_secs(3)),
                message: "slow down (E429)".to_string()
            }
        );
    }

    #[test]
    fn test_classify_malformed_success_body() {
        let resp = mock::response(200, r#"{"success":true,"data":{"merchant":{}}}"#);
        let err = classify(&resp, &RateLimitHeaders::default(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);

        let resp = mock::response(200, "not json");
        let err = classify(&resp, &RateLimitHeaders::default(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn test_classify_partial_flag() {
        let resp = mock::ok_with(crate::payload::tests::VERVE_PAYLOAD_JSON, true);
        let enriched = classify(&resp, &RateLimitHeaders::default(), Utc::now()).unwrap();
        assert!(enriched.partial);
    }
}
