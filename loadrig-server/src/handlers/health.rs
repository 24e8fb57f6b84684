//! Health check endpoint

use axum::{extract::State, response::IntoResponse, Json};
use tracing::debug;

use crate::{context::AppContext, models::HealthResponse};

/// Liveness plus a profile store probe
pub async fn health_check(State(ctx): State<AppContext>) -> impl IntoResponse {
    debug!("Health check requested");

    let profile_store = match ctx.manager.list_profiles().await {
        Ok(_) => "healthy".to_string(),
        Err(e) => format!("unhealthy: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_executions: ctx.manager.active_count().await,
        profile_store,
    })
}
