use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use cutroom_core::AppError;
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

#[utoipa::path(
    get,
    path = "/static/proxies/{file}",
    tag = "proxies",
    params(
        ("file" = String, Path, description = "Artifact file name from the upload response")
    ),
    responses(
        (status = 200, description = "Proxy video", content_type = "video/mp4"),
        (status = 404, description = "Proxy not cached", body = ErrorResponse)
    )
)]
pub async fn stream_proxy(
    State(state): State<Arc<AppState>>,
    Path(file_name): Path<String>,
) -> Result<Response, HttpAppError> {
    let not_found = || HttpAppError(AppError::NotFound(format!("Proxy '{}' not found", file_name)));

    let Some((entry, lease)) = state.store.checkout(&file_name).await? else {
        return Err(not_found());
    };

    let file = match tokio::fs::File::open(&entry.artifact_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };
    let len = file.metadata().await?.len();

    tracing::debug!(cache_key = %entry.cache_key, size_bytes = len, "Streaming proxy");

    // The lease rides along with the body so eviction waits for the download.
    let body_stream = ReaderStream::new(file).map(move |chunk| {
        let _held = &lease;
        chunk
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from_stream(body_stream))
        .map_err(|e| {
            HttpAppError(AppError::Internal(format!(
                "Failed to build proxy response: {}",
                e
            )))
        })
}
