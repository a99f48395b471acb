use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing with an env filter and a plain or JSON formatter.
///
/// `json` is usually driven by `LOG_FORMAT=json`.
pub fn init_telemetry(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer());

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cutroom=debug,tower_http=debug".into()),
        )
        .with(json_layer)
        .with(text_layer)
        .try_init()?;

    tracing::info!(json, "Tracing initialized");
    Ok(())
}

pub async fn shutdown_telemetry() {
    tracing::debug!("Telemetry shutdown");
}
