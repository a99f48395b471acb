use crate::constants::SESSION_ID_HEADER;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::utils::upload::{bytes_to_mb, receive_upload};
use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use cutroom_core::{AppError, CacheEntry, EditSession, QualityTier, SessionScope};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProxySummary {
    pub web_reference: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub duration_seconds: f64,
    pub resolution: String,
    pub quality_tier: QualityTier,
    pub created_at: DateTime<Utc>,
}

impl From<&CacheEntry> for ProxySummary {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            web_reference: entry.web_reference.clone(),
            size_bytes: entry.size_bytes,
            size_mb: bytes_to_mb(entry.size_bytes),
            duration_seconds: entry.duration_seconds,
            resolution: entry.resolution.clone(),
            quality_tier: entry.quality_tier,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OriginalSummary {
    pub filename: String,
    pub duration_seconds: f64,
    pub resolution: String,
    pub size_bytes: u64,
    pub size_mb: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub success: bool,
    pub session_id: String,
    pub cache_key: String,
    /// True when an existing proxy was reused.
    pub cache_hit: bool,
    pub proxy: ProxySummary,
    pub original: OriginalSummary,
    pub original_size: u64,
    pub message: String,
}

fn session_from_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "proxies",
    params(
        ("X-Session-ID" = Option<String>, Header, description = "Editing session; a new one is created when absent")
    ),
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Proxy ready", body = UploadResponse),
        (status = 400, description = "Unsupported format or invalid input", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 502, description = "Both encoding profiles failed", body = ErrorResponse),
        (status = 503, description = "ffmpeg is not available", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip_all, fields(session_id = tracing::field::Empty))]
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, HttpAppError> {
    let received = receive_upload(
        multipart,
        state.config.video_allowed_extensions(),
        state.config.max_video_size_bytes(),
        &state.sessions.staging_dir(),
    )
    .await?;

    let scope = match session_from_header(&headers).or_else(|| received.session_field.clone()) {
        Some(raw) => SessionScope::parse(&raw).map_err(AppError::from)?,
        None => SessionScope::generate(),
    };
    tracing::Span::current().record("session_id", scope.as_str());

    // Keeps the sweep away from the directory until the record is written.
    let _session_lease = state.store.leases().lease_session(scope.as_str()).await;

    let session_dir = state.sessions.session_dir(&scope)?;
    tokio::fs::create_dir_all(&session_dir).await?;
    let original_path = session_dir.join(&received.filename);
    received.staged.persist_to(&original_path).await?;

    tracing::info!(
        session_id = %scope,
        filename = %received.filename,
        size_bytes = received.size_bytes,
        "Original stored"
    );

    let original_media = state.prober.probe(&original_path).await;
    let original_duration = original_media.map(|m| m.duration_seconds).unwrap_or(0.0);
    let original_resolution = original_media
        .map(|m| m.resolution())
        .unwrap_or_else(|| "unknown".to_string());

    let lookup = state.store.get_or_create(&original_path, &scope).await?;
    let entry = &lookup.entry;
    let proxy = ProxySummary::from(entry);
    let original_mb = bytes_to_mb(received.size_bytes);

    state
        .sessions
        .save(
            &scope,
            &EditSession {
                session_id: scope.to_string(),
                original_filename: received.filename.clone(),
                original_path: original_path.clone(),
                original_size: received.size_bytes,
                original_duration,
                original_resolution: original_resolution.clone(),
                cache_key: entry.cache_key.clone(),
                proxy_url: entry.web_reference.clone(),
                proxy_size_mb: proxy.size_mb,
                uploaded_at: Utc::now(),
                edit_instructions: Vec::new(),
                last_edit: None,
            },
        )
        .await?;

    let body = UploadResponse {
        success: true,
        session_id: scope.to_string(),
        cache_key: entry.cache_key.clone(),
        cache_hit: lookup.hit,
        message: format!(
            "Created proxy: {}MB (Original: {}MB)",
            proxy.size_mb, original_mb
        ),
        proxy,
        original: OriginalSummary {
            filename: received.filename,
            duration_seconds: original_duration,
            resolution: original_resolution,
            size_bytes: received.size_bytes,
            size_mb: original_mb,
        },
        original_size: received.size_bytes,
    };

    let mut response = Json(body).into_response();
    if let Ok(value) = HeaderValue::from_str(scope.as_str()) {
        response.headers_mut().insert(SESSION_ID_HEADER, value);
    }
    Ok(response)
}
