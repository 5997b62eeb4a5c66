//! Health endpoint.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    /// False when no API key is configured.
    pub training_enabled: bool,
    pub active_sessions: usize,
}

/// GET /api/v1/health - Liveness plus training status.
pub async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<Health>> {
    let start = Instant::now();
    let health = Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        training_enabled: state.controller.is_some(),
        active_sessions: state
            .controller
            .as_ref()
            .map_or(0, |c| c.registry().len()),
    };
    Json(ApiResponse::success(health, start).with_link("self", "/api/v1/health"))
}
