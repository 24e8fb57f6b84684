//! Errors raised while loading or validating configuration

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// An environment override held a value of the wrong shape
    #[error("invalid value for {var}: {message}")]
    Env { var: String, message: String },

    /// A setting parsed but is unusable
    #[error("invalid {domain} configuration: {message}")]
    Invalid {
        domain: &'static str,
        message: String,
    },
}
