//! Mock implementations of the store boundaries
//!
//! Enabled with the `testing` feature, for crates that exercise the
//! orchestrator without real stores.

use async_trait::async_trait;
use loadrig_core::{Execution, ExecutionId, ProfileId, TestProfile};
use loadrig_interfaces::{ProfileStore, ResultPersister, StoreError, TerminalUpdate};
use mockall::mock;

mock! {
    pub ProfileRepo {}

    #[async_trait]
    impl ProfileStore for ProfileRepo {
        async fn get_profile(&self, id: &ProfileId) -> Result<TestProfile, StoreError>;
        async fn list_profiles(&self) -> Result<Vec<TestProfile>, StoreError>;
        async fn health_check(&self) -> Result<(), StoreError>;
    }
}

mock! {
    pub ExecutionRepo {}

    #[async_trait]
    impl ResultPersister for ExecutionRepo {
        async fn save_execution(&self, record: &Execution) -> Result<(), StoreError>;
        async fn update_execution(&self, id: ExecutionId, update: TerminalUpdate) -> Result<(), StoreError>;
        async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StoreError>;
        async fn list_executions(&self) -> Result<Vec<Execution>, StoreError>;
    }
}
