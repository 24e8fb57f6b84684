//! Logging initialization for loadrig
//!
//! Installs a global `tracing` subscriber configured from
//! [`loadrig_config::LoggingConfig`]. `log` records emitted by dependencies
//! are bridged into the same subscriber.

pub mod init;

pub use init::{build_env_filter, init_logging_from_config, init_simple_tracing};
