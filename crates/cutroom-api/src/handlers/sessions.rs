use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use cutroom_core::{AppError, SessionScope};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteSessionResponse {
    pub success: bool,
    pub session_id: String,
    pub removed_proxies: usize,
    pub removed_uploads: bool,
}

/// Drop every proxy of a session together with its upload directory.
///
/// Unknown sessions succeed with zero counts.
#[utoipa::path(
    delete,
    path = "/api/sessions/{session_id}",
    tag = "sessions",
    params(
        ("session_id" = String, Path, description = "Editing session")
    ),
    responses(
        (status = 200, description = "Session removed", body = DeleteSessionResponse),
        (status = 400, description = "Malformed session id", body = ErrorResponse)
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<DeleteSessionResponse>, HttpAppError> {
    let scope = SessionScope::parse(&session_id).map_err(AppError::from)?;

    let removed_proxies = state.store.remove_session(&scope).await?;
    let removed_uploads = state.sessions.remove(&scope).await?;

    tracing::info!(
        session_id = %scope,
        removed_proxies,
        removed_uploads,
        "Session deleted"
    );

    Ok(Json(DeleteSessionResponse {
        success: true,
        session_id: scope.to_string(),
        removed_proxies,
        removed_uploads,
    }))
}
