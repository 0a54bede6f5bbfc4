//! HTTP transport session backed by reqwest

use async_trait::async_trait;

use wsc_core::config::ClientConfig;
use wsc_core::error::TransportError;
use wsc_core::traits::{
    merge_headers, Headers, Method, Transport, TransportRequest, TransportResponse,
};

/// Authenticated HTTP channel to one controller
pub struct HttpSession {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: Option<String>,
    default_headers: Headers,
}

impl HttpSession {
    /// Create a session from client configuration
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to build HTTP client: {}", e)))?;

        let mut default_headers = Headers::new();
        default_headers.insert("Accept".to_string(), "application/json".to_string());
        let default_headers = merge_headers(&default_headers, &config.default_headers);

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            default_headers,
        })
    }

    /// Controller base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Username used for basic authentication
    pub fn username(&self) -> &str {
        &self.username
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
    }
}

#[async_trait]
impl Transport for HttpSession {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = self.url(&request.path);
        tracing::debug!(method = %request.method, url = %url, "Sending controller request");

        let mut builder = self
            .http
            .request(to_reqwest_method(request.method), &url)
            .timeout(request.timeout);

        if !self.username.is_empty() {
            builder = builder.basic_auth(&self.username, self.password.as_ref());
        }
        for (name, value) in merge_headers(&self.default_headers, &request.headers) {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let timeout = request.timeout;
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Connection(e.to_string())
            }
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?;

        tracing::debug!(url = %url, status, bytes = body.len(), "Controller responded");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
