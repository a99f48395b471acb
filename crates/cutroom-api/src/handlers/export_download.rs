use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use cutroom_core::{AppError, SessionScope};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Download a finished export.
///
/// Nothing else under the upload root is served: originals, session records,
/// staged bodies and the proxy directory all answer 404.
#[utoipa::path(
    get,
    path = "/static/uploads/{session_id}/{file}",
    tag = "sessions",
    params(
        ("session_id" = String, Path, description = "Session the export belongs to"),
        ("file" = String, Path, description = "Export file name from the export response")
    ),
    responses(
        (status = 200, description = "Exported video", content_type = "video/mp4"),
        (status = 404, description = "No such export", body = ErrorResponse)
    )
)]
pub async fn download_export(
    State(state): State<Arc<AppState>>,
    Path((session_id, file_name)): Path<(String, String)>,
) -> Result<Response, HttpAppError> {
    let not_found = || HttpAppError(AppError::NotFound(format!("Export '{}' not found", file_name)));

    let scope = SessionScope::parse(&session_id).map_err(|_| not_found())?;
    let path = state.sessions.export_path(&scope, &file_name)?;

    // Holds off the upload sweep while the file is being sent.
    let lease = state.store.leases().lease_session(scope.as_str()).await;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    tracing::debug!(session_id = %scope, export = %file_name, size_bytes = len, "Streaming export");

    let body_stream = ReaderStream::new(file).map(move |chunk| {
        let _held = &lease;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            HttpAppError(AppError::Internal(format!(
                "Failed to build export response: {}",
                e
            )))
        })
}
