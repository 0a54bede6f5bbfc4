//! Realtime ITL planning client
//!
//! Composes the configuration state cache and the scene task dispatcher into
//! the plan-and-wait flow. Whatever step fails, a task that was submitted is
//! handed back to the caller inside the error so it can be re-awaited or
//! cancelled.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use wsc_core::error::{CacheError, DispatchError};
use wsc_core::types::{RobotId, TaskKind, TaskStatus};

use crate::cache::{ConfigurationState, ConfigurationStateCache};
use crate::controller::ControllerClient;
use crate::dispatcher::{AwaitOptions, SceneTask, SceneTaskDispatcher};

/// Errors of the composed plan-and-wait operation
#[derive(Error, Debug)]
pub enum PlanError {
    /// Configuration state refresh failed; nothing was submitted
    #[error("Planning aborted before submission: {0}")]
    Refresh(#[from] CacheError),

    /// The controller did not create the planning task
    #[error("Planning task was not created: {0}")]
    Submit(#[source] DispatchError),

    /// The task exists but did not finish as awaited
    #[error("Planning task {} did not complete: {source}", .task.task_id())]
    Await {
        /// Handle of the submitted task, for re-polling or cancelling
        task: Box<SceneTask>,
        /// State refreshed before submission
        state: ConfigurationState,
        #[source]
        source: DispatchError,
    },
}

impl PlanError {
    /// Submitted task, if the failure happened after submission
    pub fn task(&self) -> Option<&SceneTask> {
        match self {
            PlanError::Await { task, .. } => Some(task.as_ref()),
            _ => None,
        }
    }

    /// Take the submitted task out of the error
    pub fn into_task(self) -> Option<SceneTask> {
        match self {
            PlanError::Await { task, .. } => Some(*task),
            _ => None,
        }
    }
}

/// Client for realtime planning against live robot state
pub struct RealtimePlanningClient {
    cache: Arc<ConfigurationStateCache>,
    dispatcher: SceneTaskDispatcher,
}

impl RealtimePlanningClient {
    /// Create a client owning a fresh configuration state cache
    pub fn new(controller: ControllerClient, dispatcher: SceneTaskDispatcher) -> Self {
        Self::with_cache(Arc::new(ConfigurationStateCache::new(controller)), dispatcher)
    }

    /// Create a client sharing an existing cache
    pub fn with_cache(cache: Arc<ConfigurationStateCache>, dispatcher: SceneTaskDispatcher) -> Self {
        Self { cache, dispatcher }
    }

    /// Configuration state cache used by this client
    pub fn cache(&self) -> &Arc<ConfigurationStateCache> {
        &self.cache
    }

    /// Task dispatcher used by this client
    pub fn dispatcher(&self) -> &SceneTaskDispatcher {
        &self.dispatcher
    }

    /// Refresh the robot's state, plan against it and wait for the result.
    ///
    /// A failed or timed-out wait returns `PlanError::Await` with the task.
    pub async fn plan_and_await(
        &self,
        robot_id: &RobotId,
        parameters: Value,
        timeout: Duration,
    ) -> Result<(SceneTask, ConfigurationState), PlanError> {
        self.plan_and_await_with(robot_id, parameters, self.dispatcher.await_options(timeout))
            .await
    }

    /// `plan_and_await` with explicit polling and cancellation
    pub async fn plan_and_await_with(
        &self,
        robot_id: &RobotId,
        parameters: Value,
        options: AwaitOptions,
    ) -> Result<(SceneTask, ConfigurationState), PlanError> {
        let state = self.cache.refresh(robot_id).await?;
        tracing::debug!(
            robot_id = %robot_id,
            observed_at = state.observed_at,
            "Planning against refreshed configuration state"
        );

        let mut task = self
            .submit_plan(robot_id, parameters)
            .await
            .map_err(PlanError::Submit)?;

        match self.dispatcher.await_completion(&mut task, &options).await {
            Ok(_) => Ok((task, state)),
            Err(source) => {
                tracing::warn!(
                    robot_id = %robot_id,
                    task_id = %task.task_id(),
                    status = %task.status(),
                    error = %source,
                    "Planning task did not complete"
                );
                Err(PlanError::Await {
                    task: Box::new(task),
                    state,
                    source,
                })
            }
        }
    }

    /// Submit a planning task for a robot without waiting for it
    pub async fn submit_plan(
        &self,
        robot_id: &RobotId,
        parameters: Value,
    ) -> Result<SceneTask, DispatchError> {
        let parameters = with_robot(robot_id, parameters);
        self.dispatcher.submit(TaskKind::Plan, parameters).await
    }

    /// Wait for a previously submitted planning task
    pub async fn await_plan(
        &self,
        task: &mut SceneTask,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<TaskStatus, DispatchError> {
        let options = self.dispatcher.await_options(timeout).with_cancel(cancel);
        self.dispatcher.await_completion(task, &options).await
    }

    /// Ask the controller to cancel a planning task
    pub async fn cancel_plan(&self, task: &mut SceneTask) -> Result<TaskStatus, DispatchError> {
        self.dispatcher.cancel(task).await
    }

    /// Cached configuration state, without a network call
    pub fn get_cached_state(&self, robot_id: &RobotId) -> Option<ConfigurationState> {
        self.cache.get(robot_id)
    }

    /// Fetch and cache the robot's current configuration state
    pub async fn refresh_state(&self, robot_id: &RobotId) -> Result<ConfigurationState, CacheError> {
        self.cache.refresh(robot_id).await
    }

    /// Forget the cached state, e.g. after the robot was moved by hand
    pub fn reset_cached_robot_configuration_state(&self, robot_id: &RobotId) -> bool {
        self.cache.reset(robot_id)
    }
}

/// Attach the robot whose state was refreshed to the planning parameters.
///
/// A different `robotId` in the parameters is replaced.
fn with_robot(robot_id: &RobotId, parameters: Value) -> Value {
    match parameters {
        Value::Object(mut map) => {
            let robot = Value::String(robot_id.to_string());
            if let Some(previous) = map.insert("robotId".to_string(), robot) {
                if previous.as_str() != Some(robot_id.as_str()) {
                    tracing::warn!(
                        robot_id = %robot_id,
                        requested = %previous,
                        "Replacing robotId in planning parameters"
                    );
                }
            }
            Value::Object(map)
        }
        Value::Null => serde_json::json!({ "robotId": robot_id.as_str() }),
        other => serde_json::json!({ "robotId": robot_id.as_str(), "parameters": other }),
    }
}
