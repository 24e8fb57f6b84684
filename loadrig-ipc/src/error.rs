//! Errors reading or interpreting runner output

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IpcError {
    /// A stdout/stderr pipe could not be read
    #[error("reading runner output failed: {0}")]
    Read(String),

    /// The summary block was not valid JSON
    #[error("runner summary is not valid JSON: {0}")]
    MalformedSummary(String),

    /// Valid JSON without the shape of a runner summary
    #[error("runner summary is missing {0}")]
    IncompleteSummary(String),
}

impl IpcError {
    /// Whether the run itself is compromised, as opposed to only its summary
    pub fn is_fatal(&self) -> bool {
        matches!(self, IpcError::Read(_))
    }
}

impl From<std::io::Error> for IpcError {
    fn from(err: std::io::Error) -> Self {
        IpcError::Read(err.to_string())
    }
}

impl From<serde_json::Error> for IpcError {
    fn from(err: serde_json::Error) -> Self {
        IpcError::MalformedSummary(err.to_string())
    }
}
