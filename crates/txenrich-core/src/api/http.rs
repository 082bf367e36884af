//! HTTP transport backed by `reqwest`.

use super::transport::{EnrichRequest, Transport, TransportResponse, ENRICH_PATH};
use crate::error::{ConfigError, TransportError};
use async_trait::async_trait;
use std::time::Duration;

const USER_AGENT: &str = concat!("txenrich/", env!("CARGO_PKG_VERSION"));

/// Sends enrichment requests to the remote service over HTTPS.
pub struct HttpTransport {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: format!("{}{ENRICH_PATH}", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn post_enrich(
        &self,
        request: &EnrichRequest,
    ) -> Result<TransportResponse, TransportError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-API-Key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp.bytes().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(format!("request failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let transport =
            HttpTransport::new("https://api.triqai.com/", "key", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.endpoint(),
            "https://api.triqai.com/v1/transactions/enrich"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connect_error() {
        // Port 9 on localhost is the discard port; nothing should be listening.
        let transport =
            HttpTransport::new("http://127.0.0.1:9", "key", Duration::from_secs(2)).unwrap();
        let request = EnrichRequest {
            title: "x".to_string(),
            country: "US".to_string(),
            kind: crate::types::TransactionType::Expense,
        };
        let err = transport.post_enrich(&request).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    }
}
