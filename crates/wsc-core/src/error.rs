//! Core error types for the webstack client

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::types::{RobotId, TaskId, TaskKind, TaskStatus};

/// Top-level error type for the webstack client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Scene task error
    #[error("Scene task error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Configuration state cache error
    #[error("Configuration state error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors raised while talking to the controller
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Could not reach the controller
    #[error("Connection failed: {0}")]
    Connection(String),

    /// No response within the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Controller answered with a 5xx status
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Controller rejected the request (4xx)
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// Controller asked the client to come back later (429/503 with Retry-After)
    #[error("Controller busy (status {status}), retry after {retry_after:?}")]
    RetryAfter { status: u16, retry_after: Duration },

    /// Response body could not be decoded
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Graph endpoint returned errors
    #[error("Graph query failed: {0}")]
    Graph(String),
}

impl TransportError {
    /// Whether the failure is transient and an idempotent request may be resent
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_)
                | TransportError::Timeout(_)
                | TransportError::Server { .. }
                | TransportError::RetryAfter { .. }
        )
    }

    /// HTTP status code, when the controller answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. }
            | TransportError::Rejected { status, .. }
            | TransportError::RetryAfter { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Delay requested by the controller, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RetryAfter { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Scene task lifecycle errors
///
/// Every variant names the task (or the kind, before an ID exists) and the
/// last status the client observed, so callers can re-poll, re-submit or
/// cancel explicitly.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The controller did not create the task
    #[error("Submission of {kind} task failed: {reason}")]
    Submission {
        kind: TaskKind,
        reason: String,
        #[source]
        source: Option<TransportError>,
    },

    /// A poll or cancel request failed after retries
    #[error("Transport failure for task {task_id} (last status: {last_status}): {source}")]
    Transport {
        task_id: TaskId,
        last_status: TaskStatus,
        #[source]
        source: TransportError,
    },

    /// Client-side deadline exceeded; the remote task is unaffected
    #[error("Timed out after {waited:?} waiting for task {task_id} (last status: {last_status})")]
    Timeout {
        task_id: TaskId,
        last_status: TaskStatus,
        waited: Duration,
    },

    /// The caller stopped waiting; the remote task is unaffected
    #[error("Stopped waiting for task {task_id} (last status: {last_status})")]
    Aborted {
        task_id: TaskId,
        last_status: TaskStatus,
    },

    /// Operation is illegal for the task's current status
    #[error("Cannot {operation} task {task_id} in status {status}")]
    InvalidState {
        task_id: TaskId,
        status: TaskStatus,
        operation: &'static str,
    },

    /// The controller did not acknowledge a cancellation
    #[error("Cancellation of task {task_id} not confirmed (status: {status})")]
    CancelUnconfirmed { task_id: TaskId, status: TaskStatus },

    /// The controller answered with something that is not a task document
    #[error("Malformed response for task {task_id}: {reason}")]
    MalformedResponse { task_id: TaskId, reason: String },
}

impl DispatchError {
    /// Task the error refers to, if one was created
    pub fn task_id(&self) -> Option<&TaskId> {
        match self {
            DispatchError::Submission { .. } => None,
            DispatchError::Transport { task_id, .. }
            | DispatchError::Timeout { task_id, .. }
            | DispatchError::Aborted { task_id, .. }
            | DispatchError::InvalidState { task_id, .. }
            | DispatchError::CancelUnconfirmed { task_id, .. }
            | DispatchError::MalformedResponse { task_id, .. } => Some(task_id),
        }
    }
}

/// Configuration state cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Refresh request failed; the cached entry was left untouched
    #[error("Failed to refresh configuration state of {robot_id}: {source}")]
    Transport {
        robot_id: RobotId,
        #[source]
        source: TransportError,
    },

    /// Controller response was not a configuration state
    #[error("Malformed configuration state for {robot_id}: {reason}")]
    Malformed { robot_id: RobotId, reason: String },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
