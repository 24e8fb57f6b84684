//! Request and response bodies

use loadrig_core::{ExecutionId, ExecutionStatus, LoadCategory, LoadSubMode, ProfileForm, ProfileId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /api/executions`
///
/// Either names a stored profile or carries an inline one.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StartExecutionRequest {
    #[serde(default)]
    pub profile_id: Option<ProfileId>,
    #[serde(default)]
    pub profile: Option<ProfileForm>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExecutionResponse {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPreviewResponse {
    pub profile_id: ProfileId,
    pub category: LoadCategory,
    pub sub_mode: LoadSubMode,
    pub options: Value,
    pub script: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_executions: usize,
    pub profile_store: String,
}
