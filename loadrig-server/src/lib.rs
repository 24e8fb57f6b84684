//! # loadrig server
//!
//! HTTP surface of the orchestrator: profile listing, script preview,
//! starting and stopping executions, and a WebSocket stream of each
//! execution's observer events.
//!
//! All handlers share one [`AppContext`] wrapping the
//! [`loadrig_execution::ExecutionManager`].

pub mod app;
pub mod context;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod startup;

pub use app::{create_app, AppConfig};
pub use context::AppContext;
pub use errors::{RestError, RestResult};
pub use startup::{build_manager, Server};
