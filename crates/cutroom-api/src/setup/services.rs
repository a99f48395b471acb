//! Service initialization and application state setup

use crate::services::SessionRegistry;
use crate::state::AppState;
use anyhow::{Context, Result};
use cutroom_cache::{ContentStore, ContentStoreConfig, LeaseTracker};
use cutroom_core::Config;
use cutroom_infra::{CleanupConfig, CleanupService};
use cutroom_processing::{
    detect_media_tools, BoundedProber, EncodingProfile, FfmpegTranscoder, FfprobeProber,
    MediaProber, MediaToolStatus, ProxyDeriver, Transcoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Detect the media tools and build the production state around ffmpeg/ffprobe.
pub async fn initialize_services(config: &Config) -> Result<Arc<AppState>> {
    let media_tools = detect_media_tools(config.ffmpeg_path(), config.ffprobe_path()).await;
    if media_tools.all_available() {
        tracing::info!(
            ffmpeg_path = %config.ffmpeg_path(),
            ffprobe_path = %config.ffprobe_path(),
            "Media tools available"
        );
    } else if config.require_media_tools() {
        anyhow::bail!(
            "Media tools unavailable (ffmpeg: {}, ffprobe: {}). Install them or set REQUIRE_MEDIA_TOOLS=false",
            media_tools.ffmpeg,
            media_tools.ffprobe
        );
    } else {
        tracing::warn!(
            ffmpeg = media_tools.ffmpeg,
            ffprobe = media_tools.ffprobe,
            "Media tools unavailable; uploads will fail until they are installed"
        );
    }

    let transcoder = Arc::new(
        FfmpegTranscoder::new(config.ffmpeg_path().to_string())
            .context("Failed to initialize transcoder")?,
    );
    let prober = Arc::new(
        FfprobeProber::new(config.ffprobe_path().to_string(), config.probe_timeout())
            .context("Failed to initialize media prober")?,
    );

    build_state(config, transcoder, prober, media_tools).await
}

/// Wire the derivation pipeline, content store and session registry.
///
/// Takes the media tool seams so tests can run without ffmpeg.
pub async fn build_state(
    config: &Config,
    transcoder: Arc<dyn Transcoder>,
    prober: Arc<dyn MediaProber>,
    media_tools: MediaToolStatus,
) -> Result<Arc<AppState>> {
    tokio::fs::create_dir_all(config.upload_root())
        .await
        .with_context(|| format!("Failed to create {}", config.upload_root().display()))?;

    // Originals on upload and derived proxies draw from the same permits.
    let prober: Arc<dyn MediaProber> =
        Arc::new(BoundedProber::new(prober, config.max_concurrent_probes()));

    let deriver = ProxyDeriver::new(
        transcoder,
        prober.clone(),
        config.proxy_dir().clone(),
        config.max_concurrent_transcodes(),
    )
    .with_profiles(
        EncodingProfile::standard().with_timeout(config.standard_transcode_timeout()),
        EncodingProfile::fallback().with_timeout(config.fallback_transcode_timeout()),
    );

    let store = ContentStore::open(
        ContentStoreConfig {
            proxy_dir: config.proxy_dir().clone(),
            web_prefix: config.proxy_url_prefix().to_string(),
            budget_bytes: config.cache_budget_bytes(),
        },
        Arc::new(deriver),
        LeaseTracker::new(),
    )
    .await
    .context("Failed to open content store")?;

    let sessions = SessionRegistry::new(config.upload_root().clone(), config.proxy_dir().clone());

    Ok(Arc::new(AppState {
        config: config.clone(),
        store: Arc::new(store),
        prober,
        sessions,
        media_tools,
    }))
}

/// Spawn the periodic sweep of stale uploads and idle proxies.
///
/// Returns `None` when `CLEANUP_INTERVAL_SECS` is 0.
pub fn start_cleanup(
    config: &Config,
    state: &AppState,
) -> Option<tokio::task::JoinHandle<()>> {
    if config.cleanup_interval_secs() == 0 {
        tracing::info!("Background cleanup disabled");
        return None;
    }

    let service = Arc::new(CleanupService::new(
        state.store.clone(),
        state.store.leases().clone(),
        CleanupConfig {
            upload_root: config.upload_root().clone(),
            interval: Duration::from_secs(config.cleanup_interval_secs()),
            upload_max_age: config.upload_max_age(),
            proxy_max_age: config.proxy_max_age(),
        },
    ));

    tracing::info!(
        interval_secs = config.cleanup_interval_secs(),
        upload_max_age_secs = config.upload_max_age().as_secs(),
        proxy_max_age_secs = config.proxy_max_age().as_secs(),
        "Background cleanup started"
    );
    Some(service.start())
}
