//! Storage implementations for loadrig
//!
//! Two flavours of each store boundary from `loadrig-interfaces`:
//! in-memory stores for tests and ephemeral servers, and filesystem stores
//! that read profile files from a directory and keep one JSON document per
//! execution.

pub mod filesystem;
pub mod memory;

#[cfg(feature = "testing")]
pub mod testing;

pub use filesystem::{load_profile_file, FileExecutionStore, FileProfileStore};
pub use memory::{InMemoryExecutionStore, InMemoryProfileStore};
