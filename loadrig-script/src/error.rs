//! Script compilation errors

use loadrig_core::CoreError;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    /// The profile cannot produce a runnable script
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// A `{{name}}` marker has no value and no data column to come from
    #[error("Invalid profile: undefined variable '{name}' in {location}")]
    UndefinedVariable { name: String, location: String },
}

impl CompileError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CompileError::InvalidProfile(message.into())
    }
}

impl From<CoreError> for CompileError {
    fn from(err: CoreError) -> Self {
        CompileError::InvalidProfile(err.to_string())
    }
}
