//! Script preview endpoint

use axum::{extract::State, response::IntoResponse, Json};
use loadrig_core::{ProfileForm, ProfileId, TestProfile};
use tracing::debug;

use crate::{context::AppContext, errors::RestResult, models::ScriptPreviewResponse};

/// Compile a profile form without running it
pub async fn preview_script(
    State(ctx): State<AppContext>,
    Json(form): Json<ProfileForm>,
) -> RestResult<impl IntoResponse> {
    let profile = TestProfile::try_from_form(ProfileId::new("preview"), form)?;
    let script = ctx.manager.preview(&profile).await?;
    debug!(
        "Previewed {} {} script ({} bytes)",
        script.category(),
        script.sub_mode(),
        script.text().len()
    );

    Ok(Json(ScriptPreviewResponse {
        profile_id: script.profile_id().clone(),
        category: script.category(),
        sub_mode: script.sub_mode(),
        options: script.options().clone(),
        script: script.into_text(),
    }))
}
