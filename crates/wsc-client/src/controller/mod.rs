//! Controller client base
//!
//! `ControllerClient` is the single request/response primitive every other
//! client is built on. It owns the retry policy:
//!
//! - connection failures, timeouts and 5xx responses are retried with
//!   exponential backoff and jitter, up to `RetryConfig::max_retries` times
//! - 429/503 responses carrying `Retry-After` wait the requested delay
//!   (capped) before the next attempt
//! - other 4xx responses are never retried
//! - nothing is retried unless the call is marked idempotent
//!
//! Domain clients hold a clone of the controller client; clones share the
//! transport.

mod status;

use bytes::Bytes;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use wsc_core::config::{ClientConfig, EndpointConfig, RetryConfig};
use wsc_core::error::TransportError;
use wsc_core::traits::{merge_headers, Headers, Method, Transport, TransportRequest, TransportResponse};

use crate::backoff::ExponentialBackoff;
use crate::transport::HttpSession;

pub(crate) use status::check_status;

/// Per-call options
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Whether the request may be resent after a transient failure
    pub idempotent: bool,
    /// Overrides the client's request timeout
    pub timeout: Option<Duration>,
    /// Extra headers for this call only
    pub headers: Headers,
}

impl CallOptions {
    /// Options for reads and other requests that are safe to resend
    pub fn idempotent() -> Self {
        Self {
            idempotent: true,
            ..Default::default()
        }
    }

    /// Options for requests that must be sent at most once
    pub fn non_idempotent() -> Self {
        Self::default()
    }

    /// Set a request timeout for this call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a header for this call
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Generic request primitives on top of a transport session
#[derive(Clone)]
pub struct ControllerClient {
    transport: Arc<dyn Transport>,
    extra_headers: Headers,
    retry: RetryConfig,
    request_timeout: Duration,
    endpoints: Arc<EndpointConfig>,
    username: String,
}

impl ControllerClient {
    /// Create a client over an existing transport
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Self {
        Self {
            transport,
            extra_headers: Headers::new(),
            retry: config.retry.clone(),
            request_timeout: config.request_timeout,
            endpoints: Arc::new(config.endpoints.clone()),
            username: config.username.clone(),
        }
    }

    /// Create a client with an HTTP session built from configuration
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        let session = HttpSession::new(config)?;
        Ok(Self::new(Arc::new(session), config))
    }

    /// Client sharing this transport that also sends `headers` on every call.
    ///
    /// Retry and backoff behaviour is unchanged.
    pub fn with_headers(&self, headers: Headers) -> Self {
        let mut client = self.clone();
        client.extra_headers = merge_headers(&self.extra_headers, &headers);
        client
    }

    /// Controller endpoint paths
    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    /// Default request timeout
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Username the session authenticates as
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Send a JSON request and decode the JSON response.
    ///
    /// An empty response body decodes to `Value::Null`.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        options: CallOptions,
    ) -> Result<Value, TransportError> {
        let response = self.call_raw(method, path, payload, options).await?;
        if response.body.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&response.body)
            .map_err(|e| TransportError::Decode(format!("{} {}: {}", method, path, e)))
    }

    /// Send a request and return the successful raw response
    pub async fn call_raw(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        options: CallOptions,
    ) -> Result<TransportResponse, TransportError> {
        let mut headers = merge_headers(&self.extra_headers, &options.headers);
        let body = match payload {
            Some(value) => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                    headers.insert("Content-Type".to_string(), "application/json".to_string());
                }
                let encoded = serde_json::to_vec(value)
                    .map_err(|e| TransportError::Decode(format!("Failed to encode payload: {}", e)))?;
                Some(Bytes::from(encoded))
            }
            None => None,
        };

        let request = TransportRequest {
            method,
            path: path.to_string(),
            headers,
            body,
            timeout: options.timeout.unwrap_or(self.request_timeout),
        };

        self.send_with_retry(request, options.idempotent).await
    }

    async fn send_with_retry(
        &self,
        request: TransportRequest,
        idempotent: bool,
    ) -> Result<TransportResponse, TransportError> {
        let mut backoff = ExponentialBackoff::from_config(&self.retry.backoff);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let result = self
                .transport
                .send(request.clone())
                .await
                .and_then(check_status);

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !idempotent || !err.is_retryable() || attempt > self.retry.max_retries {
                tracing::debug!(
                    method = %request.method,
                    path = %request.path,
                    attempt,
                    idempotent,
                    error = %err,
                    "Controller request failed"
                );
                return Err(err);
            }

            let delay = match err.retry_after() {
                Some(requested) => requested.min(self.retry.max_retry_after),
                None => backoff.next_delay(),
            };
            tracing::warn!(
                method = %request.method,
                path = %request.path,
                attempt,
                delay = ?delay,
                error = %err,
                "Transient controller failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Run a graph query or mutation and return its `data` object.
    ///
    /// Non-empty `errors` in the response fail the call even when partial
    /// data is present.
    pub async fn call_graph(
        &self,
        query: &str,
        variables: &Value,
        options: CallOptions,
    ) -> Result<Value, TransportError> {
        let payload = json!({
            "query": query,
            "variables": variables,
        });
        let path = self.endpoints.graph.clone();
        let response = self
            .call(Method::Post, &path, Some(&payload), options)
            .await?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let messages: Vec<String> = errors
                    .iter()
                    .map(|e| {
                        e.get("message")
                            .and_then(Value::as_str)
                            .map(String::from)
                            .unwrap_or_else(|| e.to_string())
                    })
                    .collect();
                return Err(TransportError::Graph(messages.join("; ")));
            }
        }

        Ok(response.get("data").cloned().unwrap_or(Value::Null))
    }
}
