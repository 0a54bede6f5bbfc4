//! wsc-client: Webstack controller client
//!
//! Realtime planning, scene task dispatch and a per-robot configuration
//! state cache over a single retrying controller client.
//!
//! ```no_run
//! use std::time::Duration;
//! use serde_json::json;
//! use wsc_client::WebstackClient;
//! use wsc_core::config::ClientConfig;
//! use wsc_core::types::RobotId;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::new("http://controller", "mujin", "secret");
//! let client = WebstackClient::from_config(&config)?;
//! let planning = client.realtime_planning();
//! let (task, _state) = planning
//!     .plan_and_await(&RobotId::from("robot1"), json!({"goal": "home"}), Duration::from_secs(30))
//!     .await?;
//! println!("{} finished as {}", task.task_id(), task.status());
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod cache;
pub mod controller;
pub mod dispatcher;
pub mod domain;
pub mod graph;
pub mod query;
pub mod realtime;
pub mod transport;

pub use cache::{ConfigurationState, ConfigurationStateCache, UpdateOutcome};
pub use controller::{CallOptions, ControllerClient};
pub use dispatcher::{AwaitOptions, SceneTask, SceneTaskDispatcher};
pub use domain::{BinpickingClient, PlanningClient, WebstackClient};
pub use graph::{GraphClient, GraphListPage, GraphListQuery, GraphListing};
pub use query::{QueryPage, MAX_QUERY_LIMIT};
pub use realtime::{PlanError, RealtimePlanningClient};
pub use transport::HttpSession;
