//! Scene task dispatcher
//!
//! Submits scene tasks and tracks them to a terminal status by polling.
//!
//! # State machine
//!
//! ```text
//! Pending ──► Running ──► Succeeded | Failed
//!    │           │
//!    └───────────┴──► Cancelled
//! ```
//!
//! Every transition comes from a controller response. Awaiting borrows the
//! task mutably, so at most one poll per task is ever outstanding. Giving up
//! on an await (timeout or cancellation token) leaves the remote task alone;
//! only `cancel` asks the controller to stop it.

mod budget;
mod task;

pub use task::SceneTask;

use serde_json::{json, Value};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use wsc_core::config::PollConfig;
use wsc_core::error::{DispatchError, TransportError};
use wsc_core::traits::Method;
use wsc_core::types::{TaskKind, TaskStatus};

use crate::controller::{CallOptions, ControllerClient};
use budget::PollBudget;
use task::{TaskDocument, Transition};

/// How long and how often to poll while awaiting a task
#[derive(Debug, Clone)]
pub struct AwaitOptions {
    /// Client-side deadline for the whole await
    pub timeout: Duration,
    /// Poll pacing
    pub poll: PollConfig,
    /// Cancelling the token stops waiting; the remote task keeps running
    pub cancel: CancellationToken,
}

impl AwaitOptions {
    /// Options with default polling and a fresh cancellation token
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll: PollConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Use a specific polling policy
    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Stop waiting when `cancel` is cancelled
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// Submits scene tasks and tracks them to completion
#[derive(Clone)]
pub struct SceneTaskDispatcher {
    controller: ControllerClient,
    poll: PollConfig,
}

impl SceneTaskDispatcher {
    /// Create a dispatcher with default polling
    pub fn new(controller: ControllerClient) -> Self {
        Self::with_poll_config(controller, PollConfig::default())
    }

    /// Create a dispatcher with a specific polling policy
    pub fn with_poll_config(controller: ControllerClient, poll: PollConfig) -> Self {
        Self { controller, poll }
    }

    /// Polling policy used by `await_options`
    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Await options using this dispatcher's polling policy
    pub fn await_options(&self, timeout: Duration) -> AwaitOptions {
        AwaitOptions::new(timeout).with_poll(self.poll.clone())
    }

    /// Submit a task. Sent once and never retried.
    pub async fn submit(&self, kind: TaskKind, parameters: Value) -> Result<SceneTask, DispatchError> {
        let payload = json!({
            "taskType": kind.as_str(),
            "taskParameters": parameters,
        });
        let path = self.controller.endpoints().scene_task.clone();

        let body = self
            .controller
            .call(Method::Post, &path, Some(&payload), CallOptions::non_idempotent())
            .await
            .map_err(|source| DispatchError::Submission {
                kind: kind.clone(),
                reason: "controller request failed".into(),
                source: Some(source),
            })?;

        let task = TaskDocument::from_value(body)
            .map_err(|e| e.to_string())
            .and_then(|document| SceneTask::from_submission(kind.clone(), document))
            .map_err(|reason| DispatchError::Submission {
                kind,
                reason,
                source: None,
            })?;

        tracing::info!(
            task_id = %task.task_id(),
            kind = %task.kind(),
            status = %task.status(),
            "Submitted scene task"
        );
        Ok(task)
    }

    /// Query the task's status once.
    ///
    /// Terminal tasks are not polled; their status is returned as is.
    pub async fn poll(&self, task: &mut SceneTask) -> Result<TaskStatus, DispatchError> {
        if task.is_terminal() {
            return Ok(task.status());
        }
        let document = self.fetch(task, self.controller.request_timeout()).await?;
        self.apply(task, document)?;
        Ok(task.status())
    }

    /// Poll until the task is terminal, the timeout passes or the caller
    /// cancels.
    ///
    /// A zero timeout fails immediately without polling. On `Timeout` or
    /// `Aborted` the task keeps its last observed status and may be awaited
    /// again or cancelled.
    pub async fn await_completion(
        &self,
        task: &mut SceneTask,
        options: &AwaitOptions,
    ) -> Result<TaskStatus, DispatchError> {
        if task.is_terminal() {
            return Ok(task.status());
        }
        if options.timeout.is_zero() {
            return Err(DispatchError::Timeout {
                task_id: task.task_id().clone(),
                last_status: task.status(),
                waited: Duration::ZERO,
            });
        }

        let mut budget = PollBudget::new(options.timeout, &options.poll);

        loop {
            let Some(wait) = budget.next_wait() else {
                return Err(Self::timed_out(task, &budget));
            };

            tokio::select! {
                biased;
                _ = options.cancel.cancelled() => return Err(Self::aborted(task)),
                _ = tokio::time::sleep(wait) => {}
            }

            if budget.expired() {
                return Err(Self::timed_out(task, &budget));
            }

            let request_timeout = budget.remaining().min(self.controller.request_timeout());
            let document = tokio::select! {
                biased;
                _ = options.cancel.cancelled() => return Err(Self::aborted(task)),
                result = tokio::time::timeout(budget.remaining(), self.fetch(task, request_timeout)) => {
                    match result {
                        Ok(document) => document?,
                        Err(_) => return Err(Self::timed_out(task, &budget)),
                    }
                }
            };

            budget.record_poll();
            self.apply(task, document)?;

            tracing::debug!(
                task_id = %task.task_id(),
                status = %task.status(),
                attempts = budget.attempts(),
                waited = ?budget.waited(),
                "Polled scene task"
            );

            if task.is_terminal() {
                return Ok(task.status());
            }
        }
    }

    /// Ask the controller to cancel the task.
    ///
    /// Succeeds only once the controller reports `Cancelled`, either in the
    /// acknowledgement or in one confirming poll.
    pub async fn cancel(&self, task: &mut SceneTask) -> Result<TaskStatus, DispatchError> {
        if !task.status().is_cancellable() {
            return Err(DispatchError::InvalidState {
                task_id: task.task_id().clone(),
                status: task.status(),
                operation: "cancel",
            });
        }

        let path = self.controller.endpoints().cancel_path(task.task_id());
        tracing::info!(task_id = %task.task_id(), "Requesting scene task cancellation");

        let body = self
            .controller
            .call(Method::Post, &path, None, CallOptions::idempotent())
            .await
            .map_err(|source| Self::transport_error(task, source))?;

        let document = TaskDocument::from_value(body).map_err(|e| DispatchError::MalformedResponse {
            task_id: task.task_id().clone(),
            reason: e.to_string(),
        })?;

        if document.status.is_some() {
            self.apply(task, document)?;
        } else {
            self.poll(task).await?;
        }

        match task.status() {
            TaskStatus::Cancelled => Ok(TaskStatus::Cancelled),
            status => Err(DispatchError::CancelUnconfirmed {
                task_id: task.task_id().clone(),
                status,
            }),
        }
    }

    async fn fetch(&self, task: &SceneTask, timeout: Duration) -> Result<TaskDocument, DispatchError> {
        let path = self.controller.endpoints().task_path(task.task_id());
        let body = self
            .controller
            .call(
                Method::Get,
                &path,
                None,
                CallOptions::idempotent().with_timeout(timeout),
            )
            .await
            .map_err(|source| Self::transport_error(task, source))?;

        TaskDocument::from_value(body).map_err(|e| DispatchError::MalformedResponse {
            task_id: task.task_id().clone(),
            reason: e.to_string(),
        })
    }

    fn apply(&self, task: &mut SceneTask, document: TaskDocument) -> Result<(), DispatchError> {
        if let Some(id) = &document.id {
            if id != task.task_id() {
                return Err(DispatchError::MalformedResponse {
                    task_id: task.task_id().clone(),
                    reason: format!("response describes task {}", id),
                });
            }
        }
        let Some(status) = document.status else {
            return Err(DispatchError::MalformedResponse {
                task_id: task.task_id().clone(),
                reason: "response carries no status".into(),
            });
        };

        match task.apply(status, document) {
            Transition::Changed { from, to } => {
                if from == TaskStatus::Running && to == TaskStatus::Pending {
                    tracing::warn!(task_id = %task.task_id(), "Controller moved task back to pending");
                }
                tracing::info!(task_id = %task.task_id(), from = %from, to = %to, "Scene task status changed");
            }
            Transition::Unchanged => {}
            Transition::Ignored => {
                tracing::debug!(
                    task_id = %task.task_id(),
                    status = %task.status(),
                    reported = %status,
                    "Ignoring update for terminal task"
                );
            }
        }
        Ok(())
    }

    fn transport_error(task: &SceneTask, source: TransportError) -> DispatchError {
        DispatchError::Transport {
            task_id: task.task_id().clone(),
            last_status: task.status(),
            source,
        }
    }

    fn timed_out(task: &SceneTask, budget: &PollBudget) -> DispatchError {
        tracing::info!(
            task_id = %task.task_id(),
            status = %task.status(),
            attempts = budget.attempts(),
            since_last_poll = ?budget.since_last_poll(),
            "Gave up waiting for scene task"
        );
        DispatchError::Timeout {
            task_id: task.task_id().clone(),
            last_status: task.status(),
            waited: budget.waited(),
        }
    }

    fn aborted(task: &SceneTask) -> DispatchError {
        tracing::info!(task_id = %task.task_id(), status = %task.status(), "Stopped waiting for scene task");
        DispatchError::Aborted {
            task_id: task.task_id().clone(),
            last_status: task.status(),
        }
    }
}
