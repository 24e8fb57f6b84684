//! Runner output protocol for loadrig
//!
//! The k6 runner talks to us only through its stdout and stderr. This crate
//! turns those pipes into [`OutputLine`]s, classifies each line, and
//! assembles the final machine-readable summary block into a
//! [`loadrig_core::ResultSummary`].

pub mod error;
pub mod protocol;
pub mod summary;
pub mod transport;

pub use error::IpcError;
pub use protocol::{classify, peak_rate, LineKind, OutputLine, STOP_ON_FAILURE_MARKER};
pub use summary::{parse_k6_summary, SummaryCollector};
pub use transport::{spawn_line_reader, LineSender};
