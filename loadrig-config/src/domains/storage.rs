//! Storage locations

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory of `<id>.yaml|.yml|.json` profile files
    pub profiles_dir: PathBuf,

    /// Directory of execution records
    pub executions_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("profiles"),
            executions_dir: PathBuf::from("executions"),
        }
    }
}

impl Validatable for StorageConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.require_path(&self.profiles_dir, "profiles_dir")?;
        self.require_path(&self.executions_dir, "executions_dir")
    }

    fn domain_name(&self) -> &'static str {
        "storage"
    }
}
