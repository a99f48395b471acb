//! Route configuration and setup

use crate::api_doc::get_openapi_spec;
use crate::constants::MULTIPART_OVERHEAD_BYTES;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue, Method},
    routing::{delete, get, post},
    Json, Router,
};
use cutroom_core::Config;
use cutroom_infra::request_id_middleware;
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let cors = setup_cors(config)?;

    let proxy_route = format!("{}/{{file}}", config.proxy_url_prefix().trim_end_matches('/'));
    let export_route = format!(
        "{}/{{session_id}}/{{file}}",
        config.upload_url_prefix().trim_end_matches('/')
    );

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    let body_limit = config.max_video_size_bytes() + MULTIPART_OVERHEAD_BYTES;
    tracing::info!(
        http_concurrency_limit,
        body_limit_bytes = body_limit,
        proxy_route = %proxy_route,
        "HTTP limits configured"
    );

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/upload", post(handlers::upload::upload_video))
        .route("/api/save-edits", post(handlers::edits::save_edits))
        .route("/api/export", post(handlers::edits::export_video))
        .route(
            "/api/sessions/{session_id}",
            delete(handlers::sessions::delete_session),
        )
        .route("/api/cache/stats", get(handlers::cache_stats::cache_stats))
        .route(&proxy_route, get(handlers::proxy_stream::stream_proxy))
        .route(&export_route, get(handlers::export_download::download_export))
        .route(
            "/api/openapi.json",
            get(|| async { Json(get_openapi_spec()) }),
        )
        .merge(utoipa_rapidoc::RapiDoc::new("/api/openapi.json").path("/docs"))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .with_state(state);

    Ok(app)
}

/// Setup CORS configuration
fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let exposed = [
        HeaderName::from_static("x-session-id"),
        HeaderName::from_static("x-request-id"),
    ];

    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new().allow_origin(origins)
    };

    Ok(cors
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers(exposed))
}
