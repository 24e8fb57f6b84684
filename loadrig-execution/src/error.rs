//! Error types for running executions

use loadrig_core::{ExecutionId, ProfileId};
use loadrig_interfaces::StoreError;
use loadrig_ipc::IpcError;
use loadrig_script::CompileError;
use thiserror::Error;

/// Runner process errors
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to start runner: {0}")]
    Spawn(String),

    #[error("Runner is not running")]
    NotRunning,

    #[error("Runner I/O error: {0}")]
    Io(String),
}

impl From<IpcError> for RunnerError {
    fn from(err: IpcError) -> Self {
        RunnerError::Io(err.to_string())
    }
}

impl From<std::io::Error> for RunnerError {
    fn from(err: std::io::Error) -> Self {
        RunnerError::Io(err.to_string())
    }
}

/// Event hub errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("No topic for execution {0}")]
    UnknownExecution(ExecutionId),

    #[error("Topic for execution {0} is already open")]
    AlreadyOpen(ExecutionId),

    #[error("Topic for execution {0} is closed")]
    Closed(ExecutionId),
}

/// Orchestrator errors
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(ProfileId),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("Execution {0} is not running")]
    NotRunning(ExecutionId),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event hub error: {0}")]
    Hub(#[from] HubError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
