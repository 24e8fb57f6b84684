//! Domain-driven configuration management for loadrig
//!
//! Configuration is split by functional domain (runner, hub, storage,
//! logging, server). Every field has a default, files are YAML, and
//! `LOADRIG_*` environment variables override individual settings.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    hub::HubConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    runner::RunnerConfig,
    server::ServerConfig,
    storage::StorageConfig,
    LoadrigConfig,
};
