//! Scripted transport for exercising the executor, scheduler and enricher.

use super::transport::{EnrichRequest, Transport, TransportResponse};
use crate::error::TransportError;
use crate::payload::tests::VERVE_PAYLOAD_JSON;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

type ScriptFn =
    Box<dyn Fn(u32, &EnrichRequest) -> Result<TransportResponse, TransportError> + Send + Sync>;
type LatencyFn = Box<dyn Fn(u32) -> Duration + Send + Sync>;

/// Shared counters, cloned out before the transport is boxed.
#[derive(Clone, Default)]
pub(crate) struct MockHandle {
    calls: Arc<AtomicU32>,
    in_flight: Arc<AtomicU32>,
    max_in_flight: Arc<AtomicU32>,
    dispatches: Arc<Mutex<Vec<(Instant, String)>>>,
}

impl MockHandle {
    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of requests that were in flight at the same time.
    pub(crate) fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Dispatch instants in call order.
    pub(crate) fn dispatch_times(&self) -> Vec<Instant> {
        self.dispatches.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    /// Titles in call order.
    pub(crate) fn titles(&self) -> Vec<String> {
        self.dispatches
            .lock()
            .unwrap()
            .iter()
            .map(|(_, title)| title.clone())
            .collect()
    }
}

/// A transport whose responses come from a closure over the call index.
pub(crate) struct MockTransport {
    script: ScriptFn,
    latency: Option<LatencyFn>,
    handle: MockHandle,
}

impl MockTransport {
    pub(crate) fn new<F>(script: F) -> Self
    where
        F: Fn(u32, &EnrichRequest) -> Result<TransportResponse, TransportError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            latency: None,
            handle: MockHandle::default(),
        }
    }

    /// Every call gets the same response.
    pub(crate) fn always(response: TransportResponse) -> Self {
        Self::new(move |_, _| Ok(response.clone()))
    }

    /// Responses in call order; the last one repeats.
    pub(crate) fn sequence(
        responses: Vec<Result<TransportResponse, TransportError>>,
    ) -> Self {
        Self::new(move |idx, _| {
            let idx = (idx as usize).min(responses.len() - 1);
            responses[idx].clone()
        })
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.with_latency(move |_| delay)
    }

    /// Per-call latency, chosen by call index.
    pub(crate) fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Box::new(latency));
        self
    }

    pub(crate) fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn post_enrich(
        &self,
        request: &EnrichRequest,
    ) -> Result<TransportResponse, TransportError> {
        let idx = self.handle.calls.fetch_add(1, Ordering::SeqCst);
        self.handle
            .dispatches
            .lock()
            .unwrap()
            .push((Instant::now(), request.title.clone()));
        let current = self.handle.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.handle.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(idx)).await;
        }
        let result = (self.script)(idx, request);

        self.handle.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub(crate) fn response(status: u16, body: &str) -> TransportResponse {
    TransportResponse {
        status,
        headers: HeaderMap::new(),
        body: body.as_bytes().to_vec(),
    }
}

/// 200 with the Verve Coffee payload.
pub(crate) fn ok_verve() -> TransportResponse {
    ok_with(VERVE_PAYLOAD_JSON, false)
}

pub(crate) fn ok_with(payload_json: &str, partial: bool) -> TransportResponse {
    response(
        200,
        &format!(
            r#"{{"success":true,"partial":{partial},"data":{payload_json},"meta":{{"requestId":"req_test","generatedAt":"2026-01-01T00:00:00Z","version":"v1"}}}}"#
        ),
    )
}

pub(crate) fn error(status: u16, message: &str) -> TransportResponse {
    response(
        status,
        &format!(r#"{{"success":false,"error":{{"code":"E{status}","message":"{message}"}}}}"#),
    )
}

pub(crate) fn with_headers(mut resp: TransportResponse, pairs: &[(&str, &str)]) -> TransportResponse {
    for (name, value) in pairs {
        resp.headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    resp
}
