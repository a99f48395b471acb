use crate::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when a media tool is missing.
    pub status: String,
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let tools = state.media_tools;
    let status = if tools.all_available() { "ok" } else { "degraded" };
    Json(HealthResponse {
        status: status.to_string(),
        ffmpeg: tools.ffmpeg,
        ffprobe: tools.ffprobe,
    })
}
