//! Transcode invoker - runs ffmpeg for one (input, profile) pair

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::profile::EncodingProfile;
use crate::error::TranscodeFailure;
use crate::tools::{validate_media_path, validate_tool_path};

const STDERR_TAIL_BYTES: usize = 2048;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Encode `input` with `profile` into `output`.
    ///
    /// `output` is only created once the encode fully succeeded; an existing
    /// file at that path is never partially overwritten.
    async fn produce(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<PathBuf, TranscodeFailure>;
}

pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String) -> Result<Self> {
        validate_tool_path(&ffmpeg_path).context("Invalid ffmpeg_path")?;
        Ok(Self { ffmpeg_path })
    }
}

/// In-progress output file, removed on drop unless committed.
struct PartialOutput {
    path: PathBuf,
    committed: bool,
}

impl PartialOutput {
    fn for_target(target: &Path) -> Self {
        let mut name = target.as_os_str().to_owned();
        name.push(".partial");
        Self {
            path: PathBuf::from(name),
            committed: false,
        }
    }

    async fn commit(mut self, target: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, target).await?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn read_tail<R: AsyncRead + Unpin>(mut reader: R) -> String {
    let mut tail = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).trim().to_string()
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self, profile), fields(
        process.executable.name = "ffmpeg",
        process.executable.path = %self.ffmpeg_path,
        proxy.tier = %profile.tier,
        timeout_secs = profile.timeout.as_secs()
    ))]
    async fn produce(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<PathBuf, TranscodeFailure> {
        validate_media_path(input).map_err(|e| TranscodeFailure::InvalidPath(e.to_string()))?;
        validate_media_path(output).map_err(|e| TranscodeFailure::InvalidPath(e.to_string()))?;

        let start = std::time::Instant::now();
        let partial = PartialOutput::for_target(output);
        let args = profile.ffmpeg_args(input, &partial.path);

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => TranscodeFailure::ToolMissing(self.ffmpeg_path.clone()),
                _ => TranscodeFailure::Spawn(e),
            })?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_tail(stderr)));

        let status = match tokio::time::timeout(profile.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(TranscodeFailure::Io(e)),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::error!(error = %e, "Failed to kill timed out ffmpeg process");
                }
                if let Some(task) = stderr_task {
                    task.abort();
                }
                tracing::warn!(
                    elapsed_ms = start.elapsed().as_millis(),
                    "ffmpeg exceeded its time budget and was terminated"
                );
                return Err(TranscodeFailure::TimedOut(profile.timeout));
            }
        };

        let stderr_tail = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(TranscodeFailure::NonZeroExit {
                code: status.code(),
                stderr_tail,
            });
        }

        let size = tokio::fs::metadata(&partial.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(TranscodeFailure::EmptyOutput);
        }

        partial.commit(output).await.map_err(TranscodeFailure::Io)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            output_bytes = size,
            output = %output.display(),
            "Transcode completed"
        );

        Ok(output.to_path_buf())
    }
}
