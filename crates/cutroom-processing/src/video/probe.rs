//! Media probe - structural metadata via ffprobe

use anyhow::{Context, Result};
use async_trait::async_trait;
use cutroom_core::MediaInfo;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::Semaphore;

use crate::tools::{validate_media_path, validate_tool_path};

#[async_trait]
pub trait MediaProber: Send + Sync {
    /// `None` when the tool fails, times out, finds no video stream or
    /// produces unparseable output.
    async fn probe(&self, path: &Path) -> Option<MediaInfo>;
}

pub struct FfprobeProber {
    ffprobe_path: String,
    timeout: Duration,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: String, timeout: Duration) -> Result<Self> {
        validate_tool_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        Ok(Self {
            ffprobe_path,
            timeout,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
}

/// Extract [`MediaInfo`] from ffprobe's JSON output.
///
/// `file_size` is used when the format section carries no size.
pub fn parse_probe_output(stdout: &[u8], file_size: Option<u64>) -> Option<MediaInfo> {
    let output: ProbeOutput = serde_json::from_slice(stdout).ok()?;

    let video = output
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))?;

    let format = output.format.as_ref();
    let duration_seconds = format
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);
    let size_bytes = format
        .and_then(|f| f.size.as_deref())
        .and_then(|s| s.parse::<u64>().ok())
        .or(file_size)
        .unwrap_or(0);

    Some(MediaInfo {
        duration_seconds,
        width: video.width.unwrap_or(0),
        height: video.height.unwrap_or(0),
        size_bytes,
    })
}

#[async_trait]
impl MediaProber for FfprobeProber {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path
    ))]
    async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        if let Err(e) = validate_media_path(path) {
            tracing::warn!(error = %e, "Refusing to probe path");
            return None;
        }

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to execute ffprobe");
                return None;
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "ffprobe timed out");
                return None;
            }
        };

        if !output.status.success() {
            tracing::warn!(status = ?output.status.code(), "ffprobe exited with failure");
            return None;
        }

        let file_size = tokio::fs::metadata(path).await.ok().map(|m| m.len());
        let info = parse_probe_output(&output.stdout, file_size);
        match &info {
            Some(info) => tracing::debug!(
                duration = info.duration_seconds,
                width = info.width,
                height = info.height,
                "Probe completed"
            ),
            None => tracing::warn!("ffprobe output had no usable video stream"),
        }
        info
    }
}

/// Caps how many inspections of `inner` run at once.
///
/// Shared by the upload handler and the deriver so one limit covers both.
pub struct BoundedProber {
    inner: Arc<dyn MediaProber>,
    permits: Arc<Semaphore>,
}

impl BoundedProber {
    pub fn new(inner: Arc<dyn MediaProber>, max_concurrent: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl MediaProber for BoundedProber {
    async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        let Ok(_permit) = self.permits.acquire().await else {
            tracing::warn!("Inspection queue closed");
            return None;
        };
        self.inner.probe(path).await
    }
}
