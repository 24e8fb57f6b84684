//! Core domain models and types for loadrig
//!
//! This crate defines the domain language shared by every other loadrig
//! crate: test profiles and their load shapes, execution records and their
//! state machine, result summaries reported by the runner, and the typed
//! events streamed to live observers. It performs no I/O.

pub mod duration;
pub mod error;
pub mod event;
pub mod execution;
pub mod profile;
pub mod summary;

// Re-export commonly used types at the crate root
pub use error::{CoreError, CoreResult};
pub use event::{EventPayload, ObserverEvent, OutputStream, Severity};
pub use execution::{Execution, ExecutionId, ExecutionStatus, FailureReason};
pub use profile::{
    HeaderInput, HeaderItem, HttpMethod, LoadCategory, LoadShape, LoadSubMode, ProfileForm,
    ProfileId, Stage, TestProfile, Threshold,
};
pub use summary::{LatencySummary, ResultSummary};
