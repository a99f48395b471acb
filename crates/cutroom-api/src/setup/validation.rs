//! Configuration validation
//!
//! Checks that depend on the running host rather than on values alone.

use anyhow::{Context, Result};
use cutroom_core::Config;

/// Validate configuration and the directories it points at.
pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() && config.cors_origins().iter().any(|o| o == "*") {
        return Err(anyhow::anyhow!(
            "CORS configured to allow all origins (*) in production. \
            Set specific allowed origins via CORS_ORIGINS."
        ));
    }

    std::fs::create_dir_all(config.upload_root()).with_context(|| {
        format!(
            "Upload root {} is not writable",
            config.upload_root().display()
        )
    })?;
    std::fs::create_dir_all(config.proxy_dir()).with_context(|| {
        format!(
            "Proxy directory {} is not writable",
            config.proxy_dir().display()
        )
    })?;

    if config.max_concurrent_transcodes() > 16 {
        tracing::warn!(
            max_concurrent_transcodes = config.max_concurrent_transcodes(),
            "MAX_CONCURRENT_TRANSCODES is very high; each transcode is CPU bound"
        );
    }

    if config.cache_budget_bytes() < config.max_video_size_bytes() as u64 / 10 {
        tracing::warn!(
            cache_budget_bytes = config.cache_budget_bytes(),
            "CACHE_BUDGET_MB is small; proxies will be evicted almost immediately"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_passes_and_creates_dirs() {
        let root = tempdir().unwrap();
        let config = Config::with_upload_root(root.path().join("uploads"));
        validate_config(&config).unwrap();
        assert!(config.proxy_dir().exists());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let root = tempdir().unwrap();
        let mut config = Config::with_upload_root(root.path().to_path_buf());
        config.0.cache_budget_bytes = 0;
        assert!(validate_config(&config).is_err());
    }
}
