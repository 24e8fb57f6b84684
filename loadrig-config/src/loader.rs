//! Configuration loading and environment variable handling

use crate::domains::logging::{LogFormat, LogLevel};
use crate::domains::LoadrigConfig;
use crate::error::{ConfigError, ConfigResult};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `LOADRIG` prefix
    pub fn new() -> Self {
        Self {
            prefix: "LOADRIG".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LoadrigConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: LoadrigConfig = if content.trim().is_empty() {
            LoadrigConfig::default()
        } else {
            serde_yaml::from_str(&content)?
        };

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LoadrigConfig> {
        let mut config = LoadrigConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<LoadrigConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply `<PREFIX>_*` environment overrides on top of the loaded values
    fn apply_env_overrides(&self, config: &mut LoadrigConfig) -> ConfigResult<()> {
        let runner = &mut config.runner;
        if let Some(path) = self.env_var("K6_PATH") {
            runner.binary = PathBuf::from(path);
        }
        if let Some(dir) = self.env_var("SCRIPTS_DIR") {
            runner.scripts_dir = PathBuf::from(dir);
        }
        if let Some(dir) = self.env_var("RESULTS_DIR") {
            runner.results_dir = PathBuf::from(dir);
        }
        if let Some(seconds) = self.parse_env::<u64>("GRACE_PERIOD_SECONDS")? {
            runner.grace_period = Duration::from_secs(seconds);
        }
        if let Some(seconds) = self.parse_env::<u64>("MAX_RUN_SECONDS")? {
            // 0 disables the limit
            runner.max_run_duration = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        if let Some(dir) = self.env_var("PROFILES_DIR") {
            config.storage.profiles_dir = PathBuf::from(dir);
        }
        if let Some(dir) = self.env_var("EXECUTIONS_DIR") {
            config.storage.executions_dir = PathBuf::from(dir);
        }

        if let Some(level) = self.parse_env::<LogLevel>("LOG_LEVEL")? {
            config.logging.level = level;
        }
        if let Some(format) = self.parse_env::<LogFormat>("LOG_FORMAT")? {
            config.logging.format = format;
        }

        if let Some(bind) = self.env_var("SERVER_BIND_ADDRESS") {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.parse_env::<u16>("SERVER_PORT")? {
            config.server.port = port;
        }

        Ok(())
    }

    fn env_var(&self, name: &str) -> Option<String> {
        std::env::var(format!("{}_{}", self.prefix, name)).ok()
    }

    fn parse_env<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        let Some(raw) = self.env_var(name) else {
            return Ok(None);
        };
        raw.trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::Env {
                var: format!("{}_{}", self.prefix, name),
                message: e.to_string(),
            })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
