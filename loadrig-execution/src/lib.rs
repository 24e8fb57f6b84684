//! Execution engine for loadrig
//!
//! Runs compiled k6 scripts as child processes and turns their output into
//! execution records and live observer events:
//!
//! - [`process`]: launching and supervising the runner process
//! - [`machine`]: the per-execution state machine
//! - [`hub`]: per-execution event fan-out to observers
//! - [`manager`]: the orchestrator tying profiles, runs and stores together

pub mod error;
pub mod hub;
pub mod machine;
pub mod manager;
pub mod process;

pub use error::{HubError, OrchestratorError, OrchestratorResult, RunnerError};
pub use hub::{EventHub, Subscription};
pub use machine::{ControlMessage, ExecutionMachine, MachinePolicy, RunServices};
pub use manager::{compile_context, ExecutionManager, TIMESTAMP_VARIABLE};
pub use process::{ExitOutcome, K6Launcher, K6Process, ProcessLauncher, RunEnvironment, RunnerProcess};
