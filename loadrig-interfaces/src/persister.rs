//! Result persister boundary

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loadrig_core::{Execution, ExecutionId, ExecutionStatus, FailureReason, ResultSummary};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::store::StoreError;

/// Everything written at an execution's terminal transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalUpdate {
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<ResultSummary>,
    pub artifact: Option<PathBuf>,
    pub exit_code: Option<i32>,
    pub failure: Option<FailureReason>,
    pub summary_unavailable: bool,
    pub logs: Option<String>,
}

impl TerminalUpdate {
    /// Snapshot the terminal fields of an execution record
    pub fn from_execution(execution: &Execution) -> Self {
        Self {
            status: execution.status,
            started_at: execution.started_at,
            ended_at: execution.ended_at,
            summary: execution.summary.clone(),
            artifact: execution.artifact.clone(),
            exit_code: execution.exit_code,
            failure: execution.failure.clone(),
            summary_unavailable: execution.summary_unavailable,
            logs: execution.logs.clone(),
        }
    }

    /// Apply onto a stored record, enforcing write-once terminal records
    pub fn apply_to(self, record: &mut Execution) -> Result<(), StoreError> {
        if record.status.is_terminal() {
            return Err(StoreError::Immutable {
                id: record.id.to_string(),
            });
        }
        if !self.status.is_terminal() {
            return Err(StoreError::Validation {
                message: format!("terminal update carries non-terminal status {}", self.status),
            });
        }
        record.status = self.status;
        record.started_at = self.started_at.or(record.started_at);
        record.ended_at = self.ended_at;
        record.summary = self.summary;
        record.artifact = self.artifact;
        record.exit_code = self.exit_code;
        record.failure = self.failure;
        record.summary_unavailable = self.summary_unavailable;
        record.logs = self.logs;
        Ok(())
    }
}

/// Durable store for execution records
#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Store a new record
    async fn save_execution(&self, record: &Execution) -> Result<(), StoreError>;

    /// Write the terminal outcome; rejected once the record is terminal
    async fn update_execution(
        &self,
        id: ExecutionId,
        update: TerminalUpdate,
    ) -> Result<(), StoreError>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StoreError>;

    /// All records, newest first
    async fn list_executions(&self) -> Result<Vec<Execution>, StoreError>;
}
