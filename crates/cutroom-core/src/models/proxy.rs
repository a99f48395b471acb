use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use utoipa::ToSchema;

use super::media::MediaInfo;

/// Encoding profile that produced a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Standard,
    /// Only produced after a standard attempt failed for the same source.
    Fallback,
}

impl QualityTier {
    /// Prefix of the artifact file name for this tier.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            QualityTier::Standard => "proxy",
            QualityTier::Fallback => "fallback",
        }
    }
}

impl Display for QualityTier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            QualityTier::Standard => write!(f, "standard"),
            QualityTier::Fallback => write!(f, "fallback"),
        }
    }
}

/// A derived editing proxy on disk, before it is registered in the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyArtifact {
    pub artifact_path: PathBuf,
    pub file_name: String,
    /// Measured from the file system after the output was finalized.
    pub size_bytes: u64,
    pub quality_tier: QualityTier,
    pub media: Option<MediaInfo>,
}

impl ProxyArtifact {
    pub fn duration_seconds(&self) -> f64 {
        self.media.map(|m| m.duration_seconds).unwrap_or(0.0)
    }

    pub fn resolution(&self) -> String {
        self.media
            .map(|m| m.resolution())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
