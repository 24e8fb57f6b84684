//! Router setup

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{context::AppContext, handlers};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub enable_cors: bool,
    pub enable_tracing: bool,
    /// API path prefix
    pub api_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_cors: true,
            enable_tracing: true,
            api_prefix: "/api".to_string(),
        }
    }
}

/// Create the complete HTTP application
pub fn create_app(context: AppContext, config: AppConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(handlers::health_check))
        .nest(&config.api_prefix, api_router())
        .with_state(context);

    if config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }
    if config.enable_tracing {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn api_router() -> Router<AppContext> {
    Router::new()
        .route("/profiles", get(handlers::list_profiles))
        .route("/profiles/{id}", get(handlers::get_profile))
        .route("/scripts/preview", post(handlers::preview_script))
        .route(
            "/executions",
            get(handlers::list_executions).post(handlers::start_execution),
        )
        .route("/executions/{id}", get(handlers::get_execution))
        .route("/executions/{id}/stop", post(handlers::stop_execution))
        .route("/executions/{id}/ws", get(handlers::execution_stream))
}
