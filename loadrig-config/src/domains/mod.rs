//! Configuration domains

pub mod hub;
pub mod logging;
pub mod runner;
pub mod server;
pub mod storage;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Complete loadrig configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadrigConfig {
    /// External runner (k6) settings
    pub runner: runner::RunnerConfig,

    /// Observer fan-out settings
    pub hub: hub::HubConfig,

    /// Profile and execution store locations
    pub storage: storage::StorageConfig,

    pub logging: logging::LoggingConfig,

    pub server: server::ServerConfig,
}

impl LoadrigConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.runner.validate()?;
        self.hub.validate()?;
        self.storage.validate()?;
        self.logging.validate()?;
        self.server.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = LoadrigConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
