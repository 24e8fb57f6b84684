//! Profile store boundary and the shared store error

use async_trait::async_trait;
use loadrig_core::{ProfileId, TestProfile};

/// Error type shared by every store implementation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    /// Terminal execution records are write-once
    #[error("Execution {id} is terminal and cannot be modified")]
    Immutable { id: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Storage IO error: {message}")]
    Io { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl StoreError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            message: err.to_string(),
        }
    }
}

/// Read access to named test profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &ProfileId) -> Result<TestProfile, StoreError>;

    async fn list_profiles(&self) -> Result<Vec<TestProfile>, StoreError>;

    /// Check if the store can serve requests
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
