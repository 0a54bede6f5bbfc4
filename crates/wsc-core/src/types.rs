//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a physical or simulated robot known to the controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RobotId(pub String);

impl RobotId {
    /// Create a new robot ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RobotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RobotId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RobotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Controller-assigned identifier of a scene task
///
/// Only the controller creates these; the client never invents one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an ID received from the controller
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of scene task submitted to the controller
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskKind {
    /// Realtime ITL planning
    Plan,
    /// Binpicking execution
    Binpicking,
    /// Any other controller-defined task type
    Custom(String),
}

impl TaskKind {
    /// Name of the task type on the wire
    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Plan => "plan",
            TaskKind::Binpicking => "binpicking",
            TaskKind::Custom(name) => name,
        }
    }
}

impl From<String> for TaskKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "plan" => TaskKind::Plan,
            "binpicking" => TaskKind::Binpicking,
            _ => TaskKind::Custom(s),
        }
    }
}

impl From<&str> for TaskKind {
    fn from(s: &str) -> Self {
        TaskKind::from(s.to_string())
    }
}

impl From<TaskKind> for String {
    fn from(kind: TaskKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a scene task as reported by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Accepted but not started
    #[serde(alias = "queued")]
    Pending,
    /// Executing on the controller
    #[serde(alias = "started")]
    Running,
    /// Finished with a result
    #[serde(alias = "finished")]
    Succeeded,
    /// Finished with an error
    #[serde(alias = "error")]
    Failed,
    /// Stopped on request
    #[serde(alias = "canceled", alias = "aborted")]
    Cancelled,
}

impl TaskStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Succeeded | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// Whether a cancellation request is legal in this status
    pub fn is_cancellable(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}
