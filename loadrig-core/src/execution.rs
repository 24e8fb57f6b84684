//! Execution domain model and its state machine rules

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::profile::ProfileId;
use crate::summary::ResultSummary;

/// Unique identifier for an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub Uuid);

impl ExecutionId {
    /// Create a new random execution ID
    pub fn new() -> Self {
        ExecutionId(Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExecutionId {
    fn from(uuid: Uuid) -> Self {
        ExecutionId(uuid)
    }
}

impl FromStr for ExecutionId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(ExecutionId)
            .map_err(|_| CoreError::InvalidExecutionId(s.to_string()))
    }
}

/// Execution status
///
/// Ordered `Pending < Running < {Completed, Failed}`. `Completed` and
/// `Failed` share a rank and are both terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Execution record exists, runner not yet started
    Pending,
    /// Runner process is alive
    Running,
    /// Runner exited successfully
    Completed,
    /// Spawn failure, abnormal exit, policy abort, stop request or timeout
    Failed,
}

impl ExecutionStatus {
    /// Position in the status partial order
    pub fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Pending => 0,
            ExecutionStatus::Running => 1,
            ExecutionStatus::Completed | ExecutionStatus::Failed => 2,
        }
    }

    /// Check if the execution is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }

    /// Check if the execution is still active
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        use ExecutionStatus::*;
        matches!(
            (self, next),
            (Pending, Running) | (Pending, Failed) | (Running, Completed) | (Running, Failed)
        )
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an execution ended in [`ExecutionStatus::Failed`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The runner could not be launched
    Spawn { message: String },
    /// The runner exited with a non-zero code
    ExitCode { code: i32 },
    /// The runner was terminated by a signal nobody here sent
    KilledBySignal { signal: i32 },
    /// A response violated a check while stop-on-failure was active
    PolicyAbort { check: String },
    /// Reading the runner's output failed mid-run
    RunnerIo { message: String },
    /// Stopped on request
    Aborted { by: String },
    /// Exceeded the configured maximum run duration
    TimedOut { after_ms: u64 },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Spawn { message } => write!(f, "runner failed to start: {message}"),
            FailureReason::ExitCode { code } => write!(f, "runner exited with code {code}"),
            FailureReason::KilledBySignal { signal } => {
                write!(f, "runner killed by signal {signal}")
            }
            FailureReason::PolicyAbort { check } => {
                write!(f, "aborted by stop-on-failure policy: {check}")
            }
            FailureReason::RunnerIo { message } => write!(f, "runner output failed: {message}"),
            FailureReason::Aborted { by } => write!(f, "stopped by {by}"),
            FailureReason::TimedOut { after_ms } => {
                write!(f, "timed out after {after_ms}ms")
            }
        }
    }
}

/// Durable record of one test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,

    /// Originating profile, by reference
    pub profile_id: ProfileId,

    /// Profile name at start time, for display only
    pub profile_name: String,

    pub status: ExecutionStatus,

    pub created_at: DateTime<Utc>,

    pub started_at: Option<DateTime<Utc>>,

    pub ended_at: Option<DateTime<Utc>>,

    /// Runner-reported aggregates, write-once at the terminal transition
    pub summary: Option<ResultSummary>,

    /// Raw runner result file
    pub artifact: Option<PathBuf>,

    pub exit_code: Option<i32>,

    pub failure: Option<FailureReason>,

    /// Set when the run ended without a parseable summary block
    #[serde(default)]
    pub summary_unavailable: bool,

    /// Tail of the runner output
    pub logs: Option<String>,
}

impl Execution {
    /// Create a new pending execution for a profile
    pub fn new(profile_id: ProfileId, profile_name: impl Into<String>) -> Self {
        Self::with_id(ExecutionId::new(), profile_id, profile_name)
    }

    pub fn with_id(id: ExecutionId, profile_id: ProfileId, profile_name: impl Into<String>) -> Self {
        Self {
            id,
            profile_id,
            profile_name: profile_name.into(),
            status: ExecutionStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
            summary: None,
            artifact: None,
            exit_code: None,
            failure: None,
            summary_unavailable: false,
            logs: None,
        }
    }

    /// Move to `next`, stamping `started_at` or `ended_at`
    pub fn transition(&mut self, next: ExecutionStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        let now = Utc::now();
        match next {
            ExecutionStatus::Running => self.started_at = Some(now),
            ExecutionStatus::Completed | ExecutionStatus::Failed => self.ended_at = Some(now),
            ExecutionStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock run time, once both timestamps exist
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_id() {
        let id1 = ExecutionId::new();
        let id2 = ExecutionId::new();
        assert_ne!(id1, id2);

        let parsed: ExecutionId = id1.to_string().parse().unwrap();
        assert_eq!(parsed, id1);
        assert!("not-a-uuid".parse::<ExecutionId>().is_err());
    }

    #[test]
    fn test_execution_status() {
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Pending.rank() < ExecutionStatus::Running.rank());
        assert_eq!(
            ExecutionStatus::Completed.rank(),
            ExecutionStatus::Failed.rank()
        );
        assert_eq!(ExecutionStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_execution_lifecycle() {
        let mut execution = Execution::new(ProfileId::new("p1"), "smoke");
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert!(execution.started_at.is_none());

        execution.transition(ExecutionStatus::Running).unwrap();
        assert!(execution.started_at.is_some());

        execution.transition(ExecutionStatus::Completed).unwrap();
        assert!(execution.ended_at.is_some());
        assert!(execution.is_terminal());
        assert!(execution.duration().is_some());
    }

    #[test]
    fn test_pending_can_fail_directly() {
        let mut execution = Execution::new(ProfileId::new("p1"), "smoke");
        execution.transition(ExecutionStatus::Failed).unwrap();
        assert!(execution.started_at.is_none());
        assert!(execution.ended_at.is_some());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut execution = Execution::new(ProfileId::new("p1"), "smoke");
        execution.transition(ExecutionStatus::Running).unwrap();
        execution.transition(ExecutionStatus::Failed).unwrap();

        let err = execution.transition(ExecutionStatus::Completed).unwrap_err();
        assert_eq!(
            err,
            CoreError::InvalidTransition {
                from: ExecutionStatus::Failed,
                to: ExecutionStatus::Completed
            }
        );
        assert!(execution.transition(ExecutionStatus::Running).is_err());
        assert!(execution.transition(ExecutionStatus::Pending).is_err());
    }

    #[test]
    fn test_failure_reason_serialization() {
        let reason = FailureReason::PolicyAbort {
            check: "status is 2xx".into(),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "policy_abort");
        assert_eq!(json["check"], "status is 2xx");
    }
}
