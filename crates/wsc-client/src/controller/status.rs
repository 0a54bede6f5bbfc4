//! Mapping of controller HTTP statuses onto transport errors

use std::time::Duration;

use wsc_core::error::TransportError;
use wsc_core::traits::TransportResponse;

/// Longest body excerpt carried in an error message
const MAX_ERROR_EXCERPT: usize = 256;

/// Turn a non-2xx response into the matching `TransportError`.
///
/// 429 and 503 carrying a numeric `Retry-After` become `RetryAfter`, other
/// 5xx become `Server`, everything else is a non-retryable `Rejected`.
pub(crate) fn check_status(response: TransportResponse) -> Result<TransportResponse, TransportError> {
    if response.is_success() {
        return Ok(response);
    }

    let status = response.status;
    if status == 429 || status == 503 {
        if let Some(retry_after) = parse_retry_after(&response) {
            return Err(TransportError::RetryAfter {
                status,
                retry_after,
            });
        }
    }

    let message = error_excerpt(&response);
    if (500..600).contains(&status) {
        Err(TransportError::Server { status, message })
    } else {
        Err(TransportError::Rejected { status, message })
    }
}

fn parse_retry_after(response: &TransportResponse) -> Option<Duration> {
    response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Prefer the controller's `error`/`message` field, fall back to raw text
fn error_excerpt(response: &TransportResponse) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&response.body) {
        for key in ["error", "message", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return truncate(text);
            }
        }
    }
    truncate(String::from_utf8_lossy(&response.body).trim())
}

fn truncate(text: &str) -> String {
    match text.char_indices().nth(MAX_ERROR_EXCERPT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
