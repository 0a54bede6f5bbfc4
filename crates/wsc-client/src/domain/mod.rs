//! Domain clients
//!
//! Thin wrappers over the scene task dispatcher and controller client.

mod binpicking;
mod planning;
mod webstack;

pub use binpicking::BinpickingClient;
pub use planning::PlanningClient;
pub use webstack::WebstackClient;
