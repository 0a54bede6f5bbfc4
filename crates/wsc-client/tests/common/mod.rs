//! Scripted in-memory transport shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use tokio::time::Instant;

use wsc_client::{ControllerClient, SceneTaskDispatcher};
use wsc_core::config::{ClientConfig, PollConfig};
use wsc_core::error::TransportError;
use wsc_core::traits::{Headers, Method, Transport, TransportRequest, TransportResponse};

/// A request as seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub headers: Headers,
    pub body: Option<Value>,
    pub at: Instant,
}

type Scripted = Result<TransportResponse, TransportError>;

/// Transport answering from per-route scripts.
///
/// Each route replays its responses in order; the last one repeats. Unknown
/// routes answer 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Append a scripted answer for a route
    pub fn on(&self, method: Method, path: &str, response: Scripted) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
        self
    }

    /// Append a JSON answer for a route
    pub fn on_json(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
        self.on(method, path, Ok(json_response(status, &body)))
    }

    /// Delay every answer, e.g. to keep requests in flight
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Requests sent to one route
    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.method == method && call.path == path)
            .collect()
    }

    pub fn call_count(&self, method: Method, path: &str) -> usize {
        self.calls_to(method, path).len()
    }

    fn next_answer(&self, method: Method, path: &str) -> Scripted {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&(method, path.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) => queue.front().cloned().unwrap(),
            None => Ok(json_response(404, &serde_json::json!({"error": "no route"}))),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let body = request
            .body
            .as_ref()
            .map(|bytes| serde_json::from_slice(bytes).unwrap());
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            path: request.path.clone(),
            headers: request.headers.clone(),
            body,
            at: Instant::now(),
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.next_answer(request.method, &request.path)
    }
}

pub fn json_response(status: u16, body: &Value) -> TransportResponse {
    TransportResponse {
        status,
        headers: Headers::from([("content-type".to_string(), "application/json".to_string())]),
        body: Bytes::from(serde_json::to_vec(body).unwrap()),
    }
}

pub fn empty_response(status: u16) -> TransportResponse {
    TransportResponse {
        status,
        headers: Headers::new(),
        body: Bytes::new(),
    }
}

/// Response carrying a `Retry-After` header in seconds
pub fn retry_after_response(status: u16, seconds: u64) -> TransportResponse {
    let mut response = empty_response(status);
    response
        .headers
        .insert("retry-after".to_string(), seconds.to_string());
    response
}

/// Configuration with deterministic, fast retries and polling
pub fn test_config() -> ClientConfig {
    let mut config = ClientConfig::new("http://controller.test", "testuser", "secret");
    config.retry.max_retries = 2;
    config.retry.backoff.initial = Duration::from_millis(100);
    config.retry.backoff.max = Duration::from_secs(1);
    config.retry.backoff.multiplier = 2.0;
    config.retry.backoff.jitter = 0.0;
    config.poll = test_poll();
    config
}

/// Polls after 100ms, 200ms, 400ms, then every 400ms
pub fn test_poll() -> PollConfig {
    PollConfig {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(400),
        multiplier: 2.0,
        default_timeout: Duration::from_secs(10),
    }
}

pub fn controller(transport: &Arc<MockTransport>) -> ControllerClient {
    ControllerClient::new(transport.clone(), &test_config())
}

pub fn dispatcher(transport: &Arc<MockTransport>) -> SceneTaskDispatcher {
    SceneTaskDispatcher::with_poll_config(controller(transport), test_poll())
}
