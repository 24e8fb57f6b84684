//! # Loadrig Interfaces
//!
//! Traits for the collaborators the orchestrator consumes but does not own:
//!
//! - [`ProfileStore`] - read access to named test profiles
//! - [`ResultPersister`] - durable execution records, written at creation and
//!   once more at the terminal transition

pub mod persister;
pub mod store;

pub use persister::{ResultPersister, TerminalUpdate};
pub use store::{ProfileStore, StoreError};
