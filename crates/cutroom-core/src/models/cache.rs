use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

use super::proxy::QualityTier;

/// One derived artifact tracked by the content store.
///
/// Persisted as a flat JSON object keyed by `cache_key` in the index file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub cache_key: String,
    pub session_scope: String,
    /// Informational; the source is never re-read through this path.
    pub source_path: PathBuf,
    pub artifact_path: PathBuf,
    pub web_reference: String,
    /// Size of `artifact_path` recorded at insertion; eviction trusts it.
    pub size_bytes: u64,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default = "unknown_resolution")]
    pub resolution: String,
    pub quality_tier: QualityTier,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

fn unknown_resolution() -> String {
    "unknown".to_string()
}

impl CacheEntry {
    /// File name of the artifact inside the proxy directory.
    pub fn file_name(&self) -> Option<&str> {
        self.artifact_path.file_name().and_then(|n| n.to_str())
    }
}

/// Point-in-time view of cache usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CacheStats {
    pub total_bytes: u64,
    pub entry_count: usize,
    pub budget_bytes: u64,
    /// `total_bytes / budget_bytes`, 0.0 when the budget is 0.
    pub usage_fraction: f64,
}

impl CacheStats {
    pub fn new(total_bytes: u64, entry_count: usize, budget_bytes: u64) -> Self {
        let usage_fraction = if budget_bytes == 0 {
            0.0
        } else {
            total_bytes as f64 / budget_bytes as f64
        };
        CacheStats {
            total_bytes,
            entry_count,
            budget_bytes,
            usage_fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_usage_fraction() {
        let stats = CacheStats::new(512, 2, 1024);
        assert_eq!(stats.usage_fraction, 0.5);
        assert_eq!(CacheStats::new(10, 1, 0).usage_fraction, 0.0);
    }

    #[test]
    fn test_entry_deserializes_without_media_fields() {
        let json = r#"{
            "cache_key": "abc_00",
            "session_scope": "abc",
            "source_path": "/u/abc/clip.mov",
            "artifact_path": "/u/proxies/proxy_abc_00.mp4",
            "web_reference": "/static/proxies/proxy_abc_00.mp4",
            "size_bytes": 42,
            "quality_tier": "standard",
            "created_at": "2024-01-01T00:00:00Z",
            "last_accessed_at": "2024-01-01T00:00:00Z"
        }"#;
        let entry: CacheEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.resolution, "unknown");
        assert_eq!(entry.duration_seconds, 0.0);
        assert_eq!(entry.file_name(), Some("proxy_abc_00.mp4"));
    }
}
