//! wsc-core: Core abstractions and configuration for the webstack client
//!
//! This crate provides the shared domain types, the error taxonomy, the
//! configuration structures and the transport seam used by the controller
//! client crate.

pub mod config;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;

pub use error::{CacheError, ClientError, ConfigError, DispatchError, TransportError};
pub use types::{RobotId, TaskId, TaskKind, TaskStatus};
