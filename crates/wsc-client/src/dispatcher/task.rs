//! Scene task handle and its lifecycle transitions

use serde::{Deserialize, Serialize};
use serde_json::Value;

use wsc_core::time::current_time_millis;
use wsc_core::types::{TaskId, TaskKind, TaskStatus};

/// Client-side view of a controller scene task
///
/// Fields are read-only for callers. The dispatcher mutates a task only by
/// applying controller responses, and never once it is terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneTask {
    task_id: TaskId,
    kind: TaskKind,
    submitted_at: u64,
    status: TaskStatus,
    result: Option<Value>,
    error: Option<String>,
}

/// Task document returned by submit, poll and cancel requests
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct TaskDocument {
    #[serde(default)]
    pub id: Option<TaskId>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl TaskDocument {
    /// Decode a response body; `null` decodes to an empty document
    pub fn from_value(body: Value) -> Result<Self, serde_json::Error> {
        if body.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(body)
    }
}

/// Effect of applying a task document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// Status did not change
    Unchanged,
    /// Status moved
    Changed { from: TaskStatus, to: TaskStatus },
    /// Task was already terminal; nothing applied
    Ignored,
}

impl SceneTask {
    /// Handle for a task created elsewhere, e.g. by a previous process.
    ///
    /// The status starts as `Pending` until the next poll reports it.
    pub fn from_id(task_id: TaskId, kind: TaskKind) -> Self {
        Self {
            task_id,
            kind,
            submitted_at: current_time_millis(),
            status: TaskStatus::Pending,
            result: None,
            error: None,
        }
    }

    /// Build the handle from a submission response
    pub(crate) fn from_submission(kind: TaskKind, document: TaskDocument) -> Result<Self, String> {
        let task_id = document
            .id
            .filter(|id| !id.as_str().is_empty())
            .ok_or_else(|| "response carries no task id".to_string())?;

        let mut task = Self::from_id(task_id, kind);
        task.status = document.status.unwrap_or(TaskStatus::Pending);
        task.result = document.result;
        task.error = document.error;
        Ok(task)
    }

    /// Controller-assigned task ID
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Task type
    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Unix milliseconds at which the client created the handle
    pub fn submitted_at(&self) -> u64 {
        self.submitted_at
    }

    /// Last status reported by the controller
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Whether the task reached a final status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Result of a succeeded task
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Error reported for a failed task
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Apply a controller document. Requires `document.status` to be set.
    pub(crate) fn apply(&mut self, status: TaskStatus, document: TaskDocument) -> Transition {
        if self.status.is_terminal() {
            return Transition::Ignored;
        }

        let from = self.status;
        self.status = status;
        match status {
            TaskStatus::Succeeded => self.result = document.result,
            TaskStatus::Failed => {
                self.error = Some(
                    document
                        .error
                        .unwrap_or_else(|| "controller reported failure without detail".into()),
                )
            }
            _ => {}
        }

        if from == status {
            Transition::Unchanged
        } else {
            Transition::Changed { from, to: status }
        }
    }
}
