//! Live observer protocol
//!
//! Every message an observer receives is an [`ObserverEvent`]: a common
//! envelope (execution id, sequence number, timestamp, optional severity
//! and message) around one closed [`EventPayload`] variant. On the wire the
//! payload is flattened into the envelope as `{"type": ..., "data": ...}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::execution::{ExecutionId, ExecutionStatus, FailureReason};
use crate::profile::ProfileId;
use crate::summary::ResultSummary;

/// Event severity shown to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Success,
}

/// Origin of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
    /// Lines produced by the orchestrator itself
    Orchestrator,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
            OutputStream::Orchestrator => "orchestrator",
        })
    }
}

/// Kind-specific event data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    ExecutionStarted {
        profile_id: ProfileId,
    },
    Status {
        status: ExecutionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        progress: Option<String>,
    },
    Log {
        stream: OutputStream,
        line: String,
    },
    ScriptPreview {
        script: String,
    },
    Info,
    Result {
        success: bool,
        summary: Option<ResultSummary>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<PathBuf>,
    },
    Error {
        reason: FailureReason,
        exit_code: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_status: Option<String>,
    },
}

impl EventPayload {
    /// Wire name of the payload kind
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::ExecutionStarted { .. } => "execution_started",
            EventPayload::Status { .. } => "status",
            EventPayload::Log { .. } => "log",
            EventPayload::ScriptPreview { .. } => "script_preview",
            EventPayload::Info => "info",
            EventPayload::Result { .. } => "result",
            EventPayload::Error { .. } => "error",
        }
    }
}

/// One message on an execution's live stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverEvent {
    pub execution_id: ExecutionId,
    /// Per-execution sequence number assigned on publish
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl ObserverEvent {
    pub fn new(execution_id: ExecutionId, payload: EventPayload) -> Self {
        Self {
            execution_id,
            seq: 0,
            timestamp: Utc::now(),
            level: None,
            message: None,
            payload,
        }
    }

    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = Some(level);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn status(execution_id: ExecutionId, status: ExecutionStatus) -> Self {
        Self::new(
            execution_id,
            EventPayload::Status {
                status,
                progress: None,
            },
        )
    }

    pub fn progress(execution_id: ExecutionId, line: impl Into<String>) -> Self {
        Self::new(
            execution_id,
            EventPayload::Status {
                status: ExecutionStatus::Running,
                progress: Some(line.into()),
            },
        )
    }

    pub fn log(execution_id: ExecutionId, stream: OutputStream, line: impl Into<String>) -> Self {
        Self::new(
            execution_id,
            EventPayload::Log {
                stream,
                line: line.into(),
            },
        )
    }

    pub fn info(execution_id: ExecutionId, message: impl Into<String>) -> Self {
        Self::new(execution_id, EventPayload::Info)
            .with_level(Severity::Info)
            .with_message(message)
    }

    /// Status carried by a `status` event
    pub fn status_value(&self) -> Option<ExecutionStatus> {
        match &self.payload {
            EventPayload::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this event closes the stream
    pub fn is_terminal_status(&self) -> bool {
        self.status_value().is_some_and(|s| s.is_terminal())
    }

    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}
