//! REST API error type and its JSON rendering

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loadrig_core::CoreError;
use loadrig_execution::OrchestratorError;
use loadrig_interfaces::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// REST API error type
#[derive(Error, Debug)]
pub enum RestError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {message}")]
    Validation { message: String },
}

/// Result type for REST operations
pub type RestResult<T> = Result<T, RestError>;

impl RestError {
    pub fn not_found(resource: &str, id: &str) -> Self {
        RestError::NotFound(format!("{} with ID '{}' not found", resource, id))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        RestError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        RestError::Validation {
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RestError::NotFound(_) => StatusCode::NOT_FOUND,
            RestError::BadRequest(_) | RestError::Validation { .. } => StatusCode::BAD_REQUEST,
            RestError::Conflict(_) => StatusCode::CONFLICT,
            RestError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RestError::NotFound(_) => "NOT_FOUND",
            RestError::BadRequest(_) => "BAD_REQUEST",
            RestError::Validation { .. } => "VALIDATION_ERROR",
            RestError::Conflict(_) => "CONFLICT",
            RestError::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    fn message(&self) -> String {
        match self {
            RestError::NotFound(msg)
            | RestError::BadRequest(msg)
            | RestError::Conflict(msg)
            | RestError::InternalError(msg) => msg.clone(),
            RestError::Validation { message } => message.clone(),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = json!({
            "error": {
                "code": self.code(),
                "message": self.message(),
                "status": status.as_u16()
            }
        });
        (status, Json(body)).into_response()
    }
}

impl From<OrchestratorError> for RestError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::ProfileNotFound(id) => RestError::not_found("Profile", id.as_str()),
            OrchestratorError::ExecutionNotFound(id) => {
                RestError::not_found("Execution", &id.to_string())
            }
            OrchestratorError::NotRunning(id) => {
                RestError::Conflict(format!("Execution '{}' is not running", id))
            }
            OrchestratorError::Compile(e) => RestError::validation_error(e.to_string()),
            OrchestratorError::Store(e) => e.into(),
            OrchestratorError::Hub(e) => RestError::InternalError(e.to_string()),
        }
    }
}

impl From<StoreError> for RestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => RestError::not_found(&entity, &id),
            conflict @ (StoreError::AlreadyExists { .. } | StoreError::Immutable { .. }) => {
                RestError::Conflict(conflict.to_string())
            }
            StoreError::Validation { message } => RestError::Validation { message },
            other => RestError::InternalError(other.to_string()),
        }
    }
}

impl From<CoreError> for RestError {
    fn from(err: CoreError) -> Self {
        RestError::validation_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadrig_core::{ExecutionId, ProfileId};

    #[test]
    fn test_orchestrator_error_mapping() {
        let not_found: RestError = OrchestratorError::ProfileNotFound(ProfileId::new("p")).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict: RestError = OrchestratorError::NotRunning(ExecutionId::new()).into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert_eq!(conflict.code(), "CONFLICT");

        let invalid: RestError =
            OrchestratorError::Compile(loadrig_script::CompileError::invalid("empty url")).into();
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_store_error_mapping() {
        let err: RestError = StoreError::Io {
            message: "disk full".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
