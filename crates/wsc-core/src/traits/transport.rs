//! Transport trait

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

/// Header name/value pairs
pub type Headers = BTreeMap<String, String>;

/// HTTP method subset used by the controller API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// A single request handed to the transport
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Path relative to the controller base URL, query string included
    pub path: String,
    /// Caller headers, merged over the session defaults
    pub headers: Headers,
    pub body: Option<Bytes>,
    pub timeout: Duration,
}

/// Raw controller response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Header names are lowercase
    pub headers: Headers,
    pub body: Bytes,
}

impl TransportResponse {
    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the status is 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authenticated channel to the controller
///
/// Implementations only move bytes: they report connection failures and
/// timeouts as `TransportError` and return every HTTP status, successful
/// or not, as a `TransportResponse`. Status interpretation and retries
/// belong to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Merge caller headers over defaults.
///
/// Keys compare case-insensitively and the caller's value wins on collision.
pub fn merge_headers(defaults: &Headers, overrides: &Headers) -> Headers {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        merged.retain(|existing, _| !existing.eq_ignore_ascii_case(key));
        merged.insert(key.clone(), value.clone());
    }
    merged
}
