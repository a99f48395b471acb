//! Configuration module
//!
//! Environment-driven configuration for the upload server, the proxy cache and
//! the background sweep. `.env` files are honoured through dotenvy.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

// Common constants
const SERVER_PORT: u16 = 4000;
const HTTP_CONCURRENCY_LIMIT: usize = 1024;
const UPLOAD_ROOT: &str = "./static/uploads";
const PROXY_URL_PREFIX: &str = "/static/proxies";
const UPLOAD_URL_PREFIX: &str = "/static/uploads";
const CACHE_BUDGET_MB: u64 = 5 * 1024;
const MAX_VIDEO_SIZE_MB: usize = 500;
const VIDEO_ALLOWED_EXTENSIONS: &str = "mp4,mkv,avi,mov,webm,flv,wmv,m4v";
const MAX_CONCURRENT_TRANSCODES: usize = 2;
const MAX_CONCURRENT_PROBES: usize = 4;
const STANDARD_TRANSCODE_TIMEOUT_SECS: u64 = 300;
const FALLBACK_TRANSCODE_TIMEOUT_SECS: u64 = 180;
const PROBE_TIMEOUT_SECS: u64 = 10;
const CLEANUP_INTERVAL_SECS: u64 = 3600;
const UPLOAD_MAX_AGE_HOURS: u64 = 6;
const PROXY_MAX_AGE_HOURS: u64 = 24;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub http_concurrency_limit: usize,
}

/// Upload, proxy cache and media tool settings
#[derive(Clone, Debug)]
pub struct ProxyCacheConfig {
    pub base: BaseConfig,
    pub upload_root: PathBuf,
    pub proxy_dir: PathBuf,
    pub proxy_url_prefix: String,
    pub upload_url_prefix: String,
    pub cache_budget_bytes: u64,
    pub max_video_size_bytes: usize,
    pub video_allowed_extensions: Vec<String>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Refuse to start when ffmpeg or ffprobe cannot be executed.
    pub require_media_tools: bool,
    pub max_concurrent_transcodes: usize,
    /// ffprobe runs allowed at once, across uploads and derivations.
    pub max_concurrent_probes: usize,
    pub standard_transcode_timeout_secs: u64,
    pub fallback_transcode_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Interval between background sweeps. 0 = disabled.
    pub cleanup_interval_secs: u64,
    pub upload_max_age_hours: u64,
    pub proxy_max_age_hours: u64,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ProxyCacheConfig>);

impl Config {
    fn inner(&self) -> &ProxyCacheConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ProxyCacheConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    /// Default settings rooted at `upload_root`, without reading the environment.
    pub fn with_upload_root(upload_root: impl Into<PathBuf>) -> Self {
        Config(Box::new(ProxyCacheConfig::with_upload_root(
            upload_root.into(),
        )))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn http_concurrency_limit(&self) -> usize {
        self.inner().base.http_concurrency_limit
    }

    pub fn upload_root(&self) -> &PathBuf {
        &self.inner().upload_root
    }

    pub fn proxy_dir(&self) -> &PathBuf {
        &self.inner().proxy_dir
    }

    pub fn proxy_url_prefix(&self) -> &str {
        &self.inner().proxy_url_prefix
    }

    pub fn upload_url_prefix(&self) -> &str {
        &self.inner().upload_url_prefix
    }

    pub fn cache_budget_bytes(&self) -> u64 {
        self.inner().cache_budget_bytes
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.inner().max_video_size_bytes
    }

    pub fn video_allowed_extensions(&self) -> &[String] {
        &self.inner().video_allowed_extensions
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.inner().ffprobe_path
    }

    pub fn require_media_tools(&self) -> bool {
        self.inner().require_media_tools
    }

    pub fn max_concurrent_transcodes(&self) -> usize {
        self.inner().max_concurrent_transcodes
    }

    pub fn max_concurrent_probes(&self) -> usize {
        self.inner().max_concurrent_probes
    }

    pub fn standard_transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().standard_transcode_timeout_secs)
    }

    pub fn fallback_transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().fallback_transcode_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.inner().probe_timeout_secs)
    }

    pub fn cleanup_interval_secs(&self) -> u64 {
        self.inner().cleanup_interval_secs
    }

    pub fn upload_max_age(&self) -> Duration {
        Duration::from_secs(self.inner().upload_max_age_hours * 3600)
    }

    pub fn proxy_max_age(&self) -> Duration {
        Duration::from_secs(self.inner().proxy_max_age_hours * 3600)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ProxyCacheConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: parse_env("PORT", SERVER_PORT),
            cors_origins,
            environment,
            http_concurrency_limit: parse_env("HTTP_CONCURRENCY_LIMIT", HTTP_CONCURRENCY_LIMIT),
        };

        let upload_root =
            PathBuf::from(env::var("UPLOAD_ROOT").unwrap_or_else(|_| UPLOAD_ROOT.to_string()));
        let proxy_dir = env::var("PROXY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| upload_root.join("proxies"));

        let cache_budget_mb: u64 = parse_env("CACHE_BUDGET_MB", CACHE_BUDGET_MB);
        let max_video_size_mb: usize = parse_env("MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB);

        let video_allowed_extensions = parse_extensions(
            &env::var("VIDEO_ALLOWED_EXTENSIONS")
                .unwrap_or_else(|_| VIDEO_ALLOWED_EXTENSIONS.to_string()),
        );

        Ok(ProxyCacheConfig {
            base,
            upload_root,
            proxy_dir,
            proxy_url_prefix: env::var("PROXY_URL_PREFIX")
                .unwrap_or_else(|_| PROXY_URL_PREFIX.to_string()),
            upload_url_prefix: env::var("UPLOAD_URL_PREFIX")
                .unwrap_or_else(|_| UPLOAD_URL_PREFIX.to_string()),
            cache_budget_bytes: cache_budget_mb * BYTES_PER_MB,
            max_video_size_bytes: max_video_size_mb * BYTES_PER_MB as usize,
            video_allowed_extensions,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
            require_media_tools: env::var("REQUIRE_MEDIA_TOOLS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
            max_concurrent_transcodes: parse_env(
                "MAX_CONCURRENT_TRANSCODES",
                MAX_CONCURRENT_TRANSCODES,
            ),
            max_concurrent_probes: parse_env("MAX_CONCURRENT_PROBES", MAX_CONCURRENT_PROBES),
            standard_transcode_timeout_secs: parse_env(
                "STANDARD_TRANSCODE_TIMEOUT_SECS",
                STANDARD_TRANSCODE_TIMEOUT_SECS,
            ),
            fallback_transcode_timeout_secs: parse_env(
                "FALLBACK_TRANSCODE_TIMEOUT_SECS",
                FALLBACK_TRANSCODE_TIMEOUT_SECS,
            ),
            probe_timeout_secs: parse_env("PROBE_TIMEOUT_SECS", PROBE_TIMEOUT_SECS),
            cleanup_interval_secs: parse_env("CLEANUP_INTERVAL_SECS", CLEANUP_INTERVAL_SECS),
            upload_max_age_hours: parse_env("UPLOAD_MAX_AGE_HOURS", UPLOAD_MAX_AGE_HOURS),
            proxy_max_age_hours: parse_env("PROXY_MAX_AGE_HOURS", PROXY_MAX_AGE_HOURS),
        })
    }

    pub fn with_upload_root(upload_root: PathBuf) -> Self {
        ProxyCacheConfig {
            base: BaseConfig {
                server_port: SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
                http_concurrency_limit: HTTP_CONCURRENCY_LIMIT,
            },
            proxy_dir: upload_root.join("proxies"),
            upload_root,
            proxy_url_prefix: PROXY_URL_PREFIX.to_string(),
            upload_url_prefix: UPLOAD_URL_PREFIX.to_string(),
            cache_budget_bytes: CACHE_BUDGET_MB * BYTES_PER_MB,
            max_video_size_bytes: MAX_VIDEO_SIZE_MB * BYTES_PER_MB as usize,
            video_allowed_extensions: parse_extensions(VIDEO_ALLOWED_EXTENSIONS),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            require_media_tools: true,
            max_concurrent_transcodes: MAX_CONCURRENT_TRANSCODES,
            max_concurrent_probes: MAX_CONCURRENT_PROBES,
            standard_transcode_timeout_secs: STANDARD_TRANSCODE_TIMEOUT_SECS,
            fallback_transcode_timeout_secs: FALLBACK_TRANSCODE_TIMEOUT_SECS,
            probe_timeout_secs: PROBE_TIMEOUT_SECS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
            upload_max_age_hours: UPLOAD_MAX_AGE_HOURS,
            proxy_max_age_hours: PROXY_MAX_AGE_HOURS,
        }
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.cache_budget_bytes == 0 {
            return Err(anyhow::anyhow!("CACHE_BUDGET_MB must be greater than 0"));
        }

        if self.max_concurrent_transcodes == 0 {
            return Err(anyhow::anyhow!(
                "MAX_CONCURRENT_TRANSCODES must be at least 1"
            ));
        }

        if self.max_concurrent_probes == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_PROBES must be at least 1"));
        }

        if self.standard_transcode_timeout_secs == 0
            || self.fallback_transcode_timeout_secs == 0
            || self.probe_timeout_secs == 0
        {
            return Err(anyhow::anyhow!(
                "Transcode and probe timeouts must be greater than 0"
            ));
        }

        if self.video_allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!(
                "VIDEO_ALLOWED_EXTENSIONS must list at least one extension"
            ));
        }

        if !self.proxy_url_prefix.starts_with('/') {
            return Err(anyhow::anyhow!(
                "PROXY_URL_PREFIX must start with '/' (got '{}')",
                self.proxy_url_prefix
            ));
        }

        if self.max_video_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_VIDEO_SIZE_MB must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_upload_layout() {
        let config = Config::with_upload_root("/tmp/cutroom");
        assert_eq!(config.proxy_dir(), &PathBuf::from("/tmp/cutroom/proxies"));
        assert_eq!(config.proxy_url_prefix(), "/static/proxies");
        assert_eq!(config.cache_budget_bytes(), 5 * 1024 * 1024 * 1024);
        assert_eq!(config.max_concurrent_transcodes(), 2);
        assert_eq!(config.max_concurrent_probes(), 4);
        assert_eq!(config.standard_transcode_timeout(), Duration::from_secs(300));
        assert_eq!(config.upload_max_age(), Duration::from_secs(6 * 3600));
        assert_eq!(config.video_allowed_extensions().len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_budget() {
        let mut config = Config::with_upload_root("/tmp/cutroom");
        config.0.cache_budget_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_inspection_permits() {
        let mut config = Config::with_upload_root("/tmp/cutroom");
        config.0.max_concurrent_probes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_proxy_prefix() {
        let mut config = Config::with_upload_root("/tmp/cutroom");
        config.0.proxy_url_prefix = "static/proxies".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("PROXY_URL_PREFIX"));
    }

    #[test]
    fn test_parse_extensions_normalizes() {
        assert_eq!(
            parse_extensions(" .MP4, mov,,webm "),
            vec!["mp4".to_string(), "mov".to_string(), "webm".to_string()]
        );
    }

    #[test]
    fn test_is_production() {
        let mut config = Config::with_upload_root("/tmp/cutroom");
        assert!(!config.is_production());
        config.0.base.environment = "Prod".to_string();
        assert!(config.is_production());
    }
}
