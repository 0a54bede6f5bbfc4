//! Controller client configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};
use crate::error::ConfigError;
use crate::types::{RobotId, TaskId};

/// Configuration for a webstack controller client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Controller base URL, e.g. `http://controller:8080`
    pub base_url: String,

    /// Username for HTTP basic authentication
    pub username: String,

    /// Password for HTTP basic authentication
    pub password: Option<String>,

    /// Timeout applied to every request unless the call overrides it
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Headers sent with every request.
    ///
    /// Headers supplied per call take precedence on key collision.
    pub default_headers: BTreeMap<String, String>,

    /// Retry policy for transient transport failures
    pub retry: RetryConfig,

    /// Polling policy for scene tasks
    pub poll: PollConfig,

    /// Controller endpoint paths
    pub endpoints: EndpointConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1".to_string(),
            username: String::new(),
            password: None,
            request_timeout: Duration::from_secs(10),
            default_headers: BTreeMap::new(),
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            endpoints: EndpointConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for a controller with credentials
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: Some(password.into()),
            ..Default::default()
        }
    }

    /// Check values that would otherwise fail at request time
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must not be empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "request_timeout must be greater than zero".into(),
            ));
        }
        self.retry.backoff.validate("retry.backoff")?;
        self.poll.validate()
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial delay
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(200),
            max: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl BackoffConfig {
    fn validate(&self, section: &str) -> Result<(), ConfigError> {
        if self.initial.is_zero() || self.initial > self.max {
            return Err(ConfigError::Invalid(format!(
                "{section}: initial delay must be non-zero and at most the max delay"
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "{section}: multiplier must be finite and at least 1.0"
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "{section}: jitter must be between 0.0 and 1.0"
            )));
        }
        Ok(())
    }
}

/// Retry policy for idempotent controller requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt; 0 disables retrying
    pub max_retries: u32,

    /// Upper bound on a controller-supplied Retry-After delay
    #[serde(with = "duration_millis")]
    pub max_retry_after: Duration,

    /// Delay between attempts
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_retry_after: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Polling policy used while awaiting scene task completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay before the first poll
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,

    /// Cap on the delay between polls
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Growth factor of the delay after every poll
    pub multiplier: f64,

    /// Await timeout used when the caller does not give one
    #[serde(with = "duration_secs")]
    pub default_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(2),
            multiplier: 1.5,
            default_timeout: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    /// Validate intervals and growth factor
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "poll.initial_interval must be greater than zero".into(),
            ));
        }
        if self.initial_interval > self.max_interval {
            return Err(ConfigError::Invalid(
                "poll.initial_interval must not exceed poll.max_interval".into(),
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "poll.multiplier must be finite and at least 1.0".into(),
            ));
        }
        Ok(())
    }
}

/// Controller endpoint paths
///
/// `{id}` and `{robot_id}` placeholders are substituted per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Scene task collection (submit)
    pub scene_task: String,
    /// Single scene task (poll)
    pub scene_task_item: String,
    /// Scene task cancellation
    pub scene_task_cancel: String,
    /// Robot configuration state
    pub configuration_state: String,
    /// Graph query endpoint
    pub graph: String,
    /// Scene listing
    pub scenes: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            scene_task: "/scenetask".to_string(),
            scene_task_item: "/scenetask/{id}".to_string(),
            scene_task_cancel: "/scenetask/{id}/cancel".to_string(),
            configuration_state: "/robot/{robot_id}/configurationstate".to_string(),
            graph: "/api/v2/graphql".to_string(),
            scenes: "/api/v1/scene/".to_string(),
        }
    }
}

/// Identifiers are substituted as single percent-encoded path segments.
impl EndpointConfig {
    /// Path polled for a task's status
    pub fn task_path(&self, task_id: &TaskId) -> String {
        self.scene_task_item
            .replace("{id}", &urlencoding::encode(task_id.as_str()))
    }

    /// Path used to request a task's cancellation
    pub fn cancel_path(&self, task_id: &TaskId) -> String {
        self.scene_task_cancel
            .replace("{id}", &urlencoding::encode(task_id.as_str()))
    }

    /// Path returning a robot's live configuration state
    pub fn configuration_state_path(&self, robot_id: &RobotId) -> String {
        self.configuration_state
            .replace("{robot_id}", &urlencoding::encode(robot_id.as_str()))
    }
}
