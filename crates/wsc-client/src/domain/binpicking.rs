//! Binpicking client

use serde_json::{Map, Value};

use wsc_core::error::DispatchError;
use wsc_core::types::{TaskKind, TaskStatus};

use crate::dispatcher::{AwaitOptions, SceneTask, SceneTaskDispatcher};

/// Runs binpicking commands as scene tasks
#[derive(Clone)]
pub struct BinpickingClient {
    dispatcher: SceneTaskDispatcher,
    scene_uri: Option<String>,
}

impl BinpickingClient {
    pub fn new(dispatcher: SceneTaskDispatcher) -> Self {
        Self {
            dispatcher,
            scene_uri: None,
        }
    }

    /// Send `sceneUri` with every command
    pub fn with_scene(mut self, scene_uri: impl Into<String>) -> Self {
        self.scene_uri = Some(scene_uri.into());
        self
    }

    /// Submit a binpicking command without waiting
    pub async fn execute(&self, command: &str, parameters: Value) -> Result<SceneTask, DispatchError> {
        let parameters = self.command_parameters(command, parameters);
        self.dispatcher.submit(TaskKind::Binpicking, parameters).await
    }

    /// Submit a command and wait for it to finish.
    ///
    /// On `Timeout` or `Aborted` the returned error names the task, which
    /// keeps running on the controller.
    pub async fn execute_and_await(
        &self,
        command: &str,
        parameters: Value,
        options: &AwaitOptions,
    ) -> Result<SceneTask, (Option<SceneTask>, DispatchError)> {
        let mut task = self
            .execute(command, parameters)
            .await
            .map_err(|e| (None, e))?;
        match self.dispatcher.await_completion(&mut task, options).await {
            Ok(_) => Ok(task),
            Err(e) => Err((Some(task), e)),
        }
    }

    /// Start the pick-and-place cycle
    pub async fn start_pick_and_place(&self, parameters: Value) -> Result<SceneTask, DispatchError> {
        self.execute("StartPickAndPlaceThread", parameters).await
    }

    /// Stop the pick-and-place cycle
    pub async fn stop_pick_and_place(&self, parameters: Value) -> Result<SceneTask, DispatchError> {
        self.execute("StopPickPlaceThread", parameters).await
    }

    /// Cancel a running binpicking task
    pub async fn cancel(&self, task: &mut SceneTask) -> Result<TaskStatus, DispatchError> {
        self.dispatcher.cancel(task).await
    }

    fn command_parameters(&self, command: &str, parameters: Value) -> Value {
        let mut map = match parameters {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("parameters".to_string(), other);
                map
            }
        };
        map.insert("command".to_string(), Value::String(command.to_string()));
        if let Some(scene_uri) = &self.scene_uri {
            map.entry("sceneUri")
                .or_insert_with(|| Value::String(scene_uri.clone()));
        }
        Value::Object(map)
    }
}
