//! Prompt record endpoints for the REST API.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};

use promptwright_core::repository::prompt::PromptRecordRepository;
use promptwright_types::training::{PromptRecord, PromptVersion, UserId};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// GET /api/v1/prompts/{user_id} - Current prompt, pending batch and history.
pub async fn get_prompt(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<PromptRecord>>, AppError> {
    let start = Instant::now();
    let user_id = UserId::new(user_id);

    let record = state.prompts.get_or_create(&user_id).await?;

    let resp = ApiResponse::success(record, start)
        .with_link("self", &format!("/api/v1/prompts/{user_id}"))
        .with_link("versions", &format!("/api/v1/prompts/{user_id}/versions"));
    Ok(Json(resp))
}

/// GET /api/v1/prompts/{user_id}/versions - Prompt version log, oldest first.
pub async fn get_prompt_versions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PromptVersion>>>, AppError> {
    let start = Instant::now();
    let user_id = UserId::new(user_id);

    let versions = state.prompts.list_versions(&user_id).await?;

    let resp = ApiResponse::success(versions, start)
        .with_link("self", &format!("/api/v1/prompts/{user_id}/versions"))
        .with_link("prompt", &format!("/api/v1/prompts/{user_id}"));
    Ok(Json(resp))
}
