//! In-memory stores

use async_trait::async_trait;
use loadrig_core::{Execution, ExecutionId, ProfileId, TestProfile};
use loadrig_interfaces::{ProfileStore, ResultPersister, StoreError, TerminalUpdate};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Profiles held in a map, keyed by id
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<ProfileId, TestProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = TestProfile>) -> Self {
        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }

    /// Insert or replace a profile
    pub async fn insert(&self, profile: TestProfile) {
        self.profiles.write().await.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: &ProfileId) -> Result<TestProfile, StoreError> {
        self.profiles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("profile", id))
    }

    async fn list_profiles(&self) -> Result<Vec<TestProfile>, StoreError> {
        let mut profiles: Vec<_> = self.profiles.read().await.values().cloned().collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }
}

/// Execution records held in a map
#[derive(Debug, Default)]
pub struct InMemoryExecutionStore {
    records: RwLock<HashMap<ExecutionId, Execution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ResultPersister for InMemoryExecutionStore {
    async fn save_execution(&self, record: &Execution) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                entity: "execution".to_string(),
                id: record.id.to_string(),
            });
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn update_execution(
        &self,
        id: ExecutionId,
        update: TerminalUpdate,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("execution", id))?;
        update.apply_to(record)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("execution", id))
    }

    async fn list_executions(&self) -> Result<Vec<Execution>, StoreError> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadrig_core::{ExecutionStatus, LoadShape};

    fn profile(id: &str) -> TestProfile {
        TestProfile::new(
            id,
            id,
            "http://localhost",
            LoadShape::ConstantVus {
                vus: 1,
                duration: "1s".into(),
            },
        )
    }

    #[tokio::test]
    async fn test_profile_store() {
        let store = InMemoryProfileStore::with_profiles([profile("b"), profile("a")]);
        let listed = store.list_profiles().await.unwrap();
        assert_eq!(listed[0].id.as_str(), "a");

        assert!(store.get_profile(&ProfileId::new("a")).await.is_ok());
        let missing = store.get_profile(&ProfileId::new("zzz")).await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_execution_store_write_once() {
        let store = InMemoryExecutionStore::new();
        let mut record = Execution::new(ProfileId::new("a"), "a");
        store.save_execution(&record).await.unwrap();
        assert!(store.save_execution(&record).await.is_err());

        record.transition(ExecutionStatus::Failed).unwrap();
        store
            .update_execution(record.id, TerminalUpdate::from_execution(&record))
            .await
            .unwrap();
        assert_eq!(
            store.get_execution(record.id).await.unwrap().status,
            ExecutionStatus::Failed
        );

        let second = store
            .update_execution(record.id, TerminalUpdate::from_execution(&record))
            .await;
        assert!(matches!(second, Err(StoreError::Immutable { .. })));
    }
}
