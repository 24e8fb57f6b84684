//! Profile endpoints

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use loadrig_core::ProfileId;
use tracing::info;

use crate::{context::AppContext, errors::RestResult};

pub async fn list_profiles(State(ctx): State<AppContext>) -> RestResult<impl IntoResponse> {
    let profiles = ctx.manager.list_profiles().await?;
    info!("Listing {} profiles", profiles.len());
    Ok(Json(profiles))
}

pub async fn get_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> RestResult<impl IntoResponse> {
    let profile = ctx.manager.get_profile(&ProfileId::new(id)).await?;
    Ok(Json(profile))
}
