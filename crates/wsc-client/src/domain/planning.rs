//! Offline scene planning client

use serde_json::{json, Value};

use wsc_core::error::DispatchError;
use wsc_core::types::{TaskKind, TaskStatus};

use crate::dispatcher::{AwaitOptions, SceneTask, SceneTaskDispatcher};

/// Submits planning tasks against a stored scene
#[derive(Clone)]
pub struct PlanningClient {
    dispatcher: SceneTaskDispatcher,
    scene_uri: String,
}

impl PlanningClient {
    pub fn new(dispatcher: SceneTaskDispatcher, scene_uri: impl Into<String>) -> Self {
        Self {
            dispatcher,
            scene_uri: scene_uri.into(),
        }
    }

    /// Scene the client plans in
    pub fn scene_uri(&self) -> &str {
        &self.scene_uri
    }

    /// Submit a planning task in this client's scene
    pub async fn submit(&self, parameters: Value) -> Result<SceneTask, DispatchError> {
        let payload = json!({
            "sceneUri": self.scene_uri,
            "parameters": parameters,
        });
        self.dispatcher.submit(TaskKind::Plan, payload).await
    }

    /// Wait for a planning task and return its result.
    ///
    /// A `Failed` or `Cancelled` task yields `Ok(None)`; the reason is on
    /// the task.
    pub async fn await_result(
        &self,
        task: &mut SceneTask,
        options: &AwaitOptions,
    ) -> Result<Option<Value>, DispatchError> {
        match self.dispatcher.await_completion(task, options).await? {
            TaskStatus::Succeeded => Ok(task.result().cloned()),
            _ => Ok(None),
        }
    }

    /// Cancel a planning task
    pub async fn cancel(&self, task: &mut SceneTask) -> Result<TaskStatus, DispatchError> {
        self.dispatcher.cancel(task).await
    }
}
