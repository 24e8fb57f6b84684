//! Execution endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use loadrig_core::{ExecutionStatus, ProfileId, TestProfile};
use tracing::info;

use crate::{
    context::AppContext,
    errors::{RestError, RestResult},
    handlers::parse_execution_id,
    models::{StartExecutionRequest, StartExecutionResponse},
};

/// Profile id given to inline profiles
const INLINE_PROFILE_ID: &str = "inline";

/// Start a run; answers once the execution is recorded, not when it ends
pub async fn start_execution(
    State(ctx): State<AppContext>,
    Json(request): Json<StartExecutionRequest>,
) -> RestResult<impl IntoResponse> {
    let execution_id = match (request.profile_id, request.profile) {
        (Some(profile_id), None) => ctx.manager.start(&profile_id).await?,
        (None, Some(form)) => {
            let profile = TestProfile::try_from_form(ProfileId::new(INLINE_PROFILE_ID), form)?;
            ctx.manager.start_profile(profile).await?
        }
        (Some(_), Some(_)) => {
            return Err(RestError::bad_request(
                "Provide either 'profile_id' or 'profile', not both",
            ))
        }
        (None, None) => return Err(RestError::bad_request("'profile_id' is required")),
    };
    info!("Accepted execution {}", execution_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(StartExecutionResponse {
            execution_id,
            status: ExecutionStatus::Pending,
        }),
    ))
}

pub async fn list_executions(State(ctx): State<AppContext>) -> RestResult<impl IntoResponse> {
    Ok(Json(ctx.manager.list().await?))
}

/// Stored record of one execution
///
/// The record is written when the run starts and again at its terminal
/// transition only, so a live run reads as `pending` with no `started_at`.
/// Observers follow the live status over the event stream.
pub async fn get_execution(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> RestResult<impl IntoResponse> {
    let id = parse_execution_id(&id)?;
    Ok(Json(ctx.manager.get(id).await?))
}

pub async fn stop_execution(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> RestResult<impl IntoResponse> {
    let id = parse_execution_id(&id)?;
    ctx.manager.stop(id).await?;
    info!("Stop requested for execution {}", id);
    Ok(StatusCode::ACCEPTED)
}
