//! Runner (k6) process configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// How the external runner is launched and supervised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Runner executable, looked up on `PATH` when not absolute
    pub binary: PathBuf,

    /// Where compiled scripts are written before a run
    pub scripts_dir: PathBuf,

    /// Where the runner writes its raw JSON result stream
    pub results_dir: PathBuf,

    /// Time between the graceful stop signal and the forced kill
    #[serde(with = "humantime_serde")]
    pub grace_period: Duration,

    /// Runs longer than this are stopped and marked failed
    #[serde(
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_run_duration: Option<Duration>,

    /// Extra arguments inserted before the script path
    pub extra_args: Vec<String>,

    /// Size cap for the persisted output tail
    pub max_log_bytes: usize,

    /// Capacity of the channel between the pipe readers and the state machine
    pub line_buffer: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("k6"),
            scripts_dir: PathBuf::from("scripts"),
            results_dir: PathBuf::from("results"),
            grace_period: Duration::from_secs(5),
            max_run_duration: None,
            extra_args: Vec::new(),
            max_log_bytes: 5 * 1024 * 1024,
            line_buffer: 1024,
        }
    }
}

impl Validatable for RunnerConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.require_path(&self.binary, "binary")?;
        self.require_path(&self.scripts_dir, "scripts_dir")?;
        self.require_path(&self.results_dir, "results_dir")?;
        self.require_nonzero(self.grace_period, "grace_period")?;
        if let Some(max) = self.max_run_duration {
            self.require_nonzero(max, "max_run_duration")?;
        }
        self.require_positive(self.max_log_bytes, "max_log_bytes")?;
        self.require_positive(self.line_buffer, "line_buffer")
    }

    fn domain_name(&self) -> &'static str {
        "runner"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runner_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.binary, PathBuf::from("k6"));
        assert_eq!(config.grace_period, Duration::from_secs(5));
        assert_eq!(config.max_log_bytes, 5 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_runner_validation() {
        let mut config = RunnerConfig {
            grace_period: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.grace_period = Duration::from_secs(1);
        config.binary = PathBuf::new();
        assert!(config.validate().is_err());

        config.binary = PathBuf::from("/usr/local/bin/k6");
        config.max_run_duration = Some(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations_are_human_readable() {
        let config: RunnerConfig =
            serde_yaml::from_str("grace_period: 250ms\nmax_run_duration: 1h 30m\n").unwrap();
        assert_eq!(config.grace_period, Duration::from_millis(250));
        assert_eq!(config.max_run_duration, Some(Duration::from_secs(5400)));

        let yaml = serde_yaml::to_string(&RunnerConfig::default()).unwrap();
        assert!(yaml.contains("grace_period: 5s"));
        assert!(!yaml.contains("max_run_duration"));

        assert!(serde_yaml::from_str::<RunnerConfig>("grace_period: soon\n").is_err());
    }
}
