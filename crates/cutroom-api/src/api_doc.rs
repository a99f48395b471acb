//! OpenAPI documentation, served at `/api/openapi.json` and browsable under `/docs`.

use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use cutroom_core::{CacheStats, QualityTier};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cutroom API",
        version = "0.1.0",
        description = "Upload videos for browser editing. Each upload is reduced to a lightweight proxy that is cached by content and session, and evicted least-recently-used when the cache exceeds its byte budget."
    ),
    paths(
        handlers::upload::upload_video,
        handlers::proxy_stream::stream_proxy,
        handlers::sessions::delete_session,
        handlers::edits::save_edits,
        handlers::edits::export_video,
        handlers::export_download::download_export,
        handlers::cache_stats::cache_stats,
        handlers::health::health_check,
    ),
    components(
        schemas(
            handlers::upload::UploadResponse,
            handlers::upload::ProxySummary,
            handlers::upload::OriginalSummary,
            handlers::sessions::DeleteSessionResponse,
            handlers::edits::SaveEditsRequest,
            handlers::edits::SaveEditsResponse,
            handlers::edits::ExportRequest,
            handlers::edits::ExportResponse,
            handlers::health::HealthResponse,
            CacheStats,
            QualityTier,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "proxies", description = "Upload, proxy streaming and cache usage"),
        (name = "sessions", description = "Edit sessions, saved edits and exports"),
        (name = "health", description = "Service and media tool availability")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
