use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use cutroom_core::{AppError, SessionScope};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveEditsRequest {
    pub session_id: Option<String>,
    /// Opaque edit instructions (cuts, effects) from the editor.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub edits: Vec<JsonValue>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SaveEditsResponse {
    pub success: bool,
    pub edit_count: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportRequest {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ExportResponse {
    pub success: bool,
    pub export_url: String,
    pub message: String,
}

fn required_scope(session_id: Option<&str>) -> Result<SessionScope, AppError> {
    let raw = session_id
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("No session ID provided".to_string()))?;
    Ok(SessionScope::parse(raw)?)
}

#[utoipa::path(
    post,
    path = "/api/save-edits",
    tag = "sessions",
    request_body = SaveEditsRequest,
    responses(
        (status = 200, description = "Edits stored", body = SaveEditsResponse),
        (status = 400, description = "Missing session id", body = ErrorResponse),
        (status = 404, description = "Session not found", body = ErrorResponse)
    )
)]
pub async fn save_edits(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<SaveEditsRequest>,
) -> Result<Json<SaveEditsResponse>, HttpAppError> {
    let scope = required_scope(request.session_id.as_deref())?;

    let session = state
        .sessions
        .record_edits(&scope, request.edits)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", scope)))?;

    tracing::info!(session_id = %scope, edits = session.edit_instructions.len(), "Edits saved");

    Ok(Json(SaveEditsResponse {
        success: true,
        edit_count: session.edit_instructions.len(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/export",
    tag = "sessions",
    request_body = ExportRequest,
    responses(
        (status = 200, description = "Export written next to the original", body = ExportResponse),
        (status = 400, description = "Missing session id", body = ErrorResponse),
        (status = 404, description = "Session or original not found", body = ErrorResponse)
    )
)]
pub async fn export_video(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ExportRequest>,
) -> Result<Json<ExportResponse>, HttpAppError> {
    let scope = required_scope(request.session_id.as_deref())?;

    let file_name = state.sessions.export_original(&scope).await?;
    let export_url = format!(
        "{}/{}/{}",
        state.config.upload_url_prefix().trim_end_matches('/'),
        scope,
        file_name
    );

    Ok(Json(ExportResponse {
        success: true,
        export_url,
        message: "Export created (edits applied to original quality)".to_string(),
    }))
}
