//! Filesystem-backed stores
//!
//! Profiles are `<id>.yaml`, `<id>.yml` or `<id>.json` files holding a
//! [`ProfileForm`]; the file stem is the profile id. Executions are
//! `<execution-id>.json` documents, written through a temporary file and a
//! rename so readers never see a partial record.

use async_trait::async_trait;
use loadrig_core::{Execution, ExecutionId, ProfileForm, ProfileId, TestProfile};
use loadrig_interfaces::{ProfileStore, ResultPersister, StoreError, TerminalUpdate};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const PROFILE_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

fn serialization(err: impl std::fmt::Display) -> StoreError {
    StoreError::Serialization {
        message: err.to_string(),
    }
}

/// Parse profile file contents, picking the format from the extension
pub fn parse_profile(id: ProfileId, path: &Path, contents: &str) -> Result<TestProfile, StoreError> {
    let form: ProfileForm = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(contents).map_err(serialization)?,
        _ => serde_yaml::from_str(contents).map_err(serialization)?,
    };
    TestProfile::try_from_form(id, form).map_err(|e| StoreError::Validation {
        message: format!("{}: {}", path.display(), e),
    })
}

/// Load a single profile file; its stem becomes the profile id
pub async fn load_profile_file(path: &Path) -> Result<TestProfile, StoreError> {
    let contents = fs::read_to_string(path).await?;
    let id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(ProfileId::new)
        .ok_or_else(|| StoreError::Validation {
            message: format!("cannot derive a profile id from {}", path.display()),
        })?;
    parse_profile(id, path, &contents)
}

/// Directory of profile files
#[derive(Debug, Clone)]
pub struct FileProfileStore {
    dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn get_profile(&self, id: &ProfileId) -> Result<TestProfile, StoreError> {
        // Ids are file stems; refuse anything that could escape the directory
        if id.as_str().is_empty() || id.as_str().contains(['/', '\\']) || id.as_str() == ".." {
            return Err(StoreError::not_found("profile", id));
        }
        for ext in PROFILE_EXTENSIONS {
            let path = self.dir.join(format!("{}.{}", id, ext));
            if fs::try_exists(&path).await? {
                let contents = fs::read_to_string(&path).await?;
                return parse_profile(id.clone(), &path, &contents);
            }
        }
        Err(StoreError::not_found("profile", id))
    }

    async fn list_profiles(&self) -> Result<Vec<TestProfile>, StoreError> {
        let mut profiles = Vec::new();
        if !fs::try_exists(&self.dir).await? {
            warn!("Profiles directory does not exist: {:?}", self.dir);
            return Ok(profiles);
        }

        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_profile = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| PROFILE_EXTENSIONS.contains(&e));
            if !is_profile {
                continue;
            }
            match load_profile_file(&path).await {
                Ok(profile) => profiles.push(profile),
                Err(e) => warn!("Skipping unreadable profile {:?}: {}", path, e),
            }
        }
        profiles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(profiles)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        if fs::try_exists(&self.dir).await? {
            Ok(())
        } else {
            Err(StoreError::Io {
                message: format!("profiles directory {} is missing", self.dir.display()),
            })
        }
    }
}

/// One JSON document per execution
#[derive(Debug)]
pub struct FileExecutionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileExecutionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn record_path(&self, id: ExecutionId) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read_record(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        let path = self.record_path(id);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::not_found("execution", id))
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents).map_err(serialization)
    }

    async fn write_record(&self, record: &Execution) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(record).map_err(serialization)?;
        let final_path = self.record_path(record.id);
        let tmp_path = self
            .dir
            .join(format!(".{}.{}.tmp", record.id, uuid::Uuid::new_v4()));
        fs::write(&tmp_path, json).await?;
        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        debug!("Wrote execution record {:?}", final_path);
        Ok(())
    }
}

#[async_trait]
impl ResultPersister for FileExecutionStore {
    async fn save_execution(&self, record: &Execution) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(self.record_path(record.id)).await? {
            return Err(StoreError::AlreadyExists {
                entity: "execution".to_string(),
                id: record.id.to_string(),
            });
        }
        self.write_record(record).await
    }

    async fn update_execution(
        &self,
        id: ExecutionId,
        update: TerminalUpdate,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_record(id).await?;
        update.apply_to(&mut record)?;
        self.write_record(&record).await
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Execution, StoreError> {
        self.read_record(id).await
    }

    async fn list_executions(&self) -> Result<Vec<Execution>, StoreError> {
        let mut records = Vec::new();
        if !fs::try_exists(&self.dir).await? {
            return Ok(records);
        }
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|e| e == "json")
                && !path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
            if !is_record {
                continue;
            }
            let contents = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Execution>(&contents) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable execution record {:?}: {}", path, e),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}
