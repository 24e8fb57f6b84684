//! Core error types for loadrig

use thiserror::Error;

use crate::execution::ExecutionStatus;

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised by the domain model itself
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    /// A required profile field for the selected load shape is absent
    #[error("Missing field '{field}' required by {mode} load mode")]
    MissingField { field: &'static str, mode: String },

    /// A profile field holds a value the model cannot accept
    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: &'static str, message: String },

    /// Unknown HTTP method
    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    /// Unparseable execution identifier
    #[error("Invalid execution id: {0}")]
    InvalidExecutionId(String),

    /// Status change that would move the state machine backwards or out of a terminal state
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ExecutionStatus,
        to: ExecutionStatus,
    },
}
