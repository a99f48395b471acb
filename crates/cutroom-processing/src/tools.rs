//! Media tool discovery and argument hygiene.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Reject paths containing shell metacharacters or traversal sequences.
pub fn validate_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }

    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }

    Ok(())
}

/// Tool paths are either a bare command name or a plain file system path.
pub fn validate_tool_path(tool_path: &str) -> Result<()> {
    validate_path(tool_path)?;

    if tool_path.is_empty()
        || !tool_path.chars().all(|c| {
            c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
        })
    {
        return Err(anyhow!(
            "Invalid tool path '{}': contains unsafe characters",
            tool_path
        ));
    }

    Ok(())
}

pub fn validate_media_path(path: &Path) -> Result<()> {
    validate_path(&path.to_string_lossy())
}

/// Runs `<tool> -version` and reports whether it exited successfully.
pub async fn check_tool(tool_path: &str) -> bool {
    if validate_tool_path(tool_path).is_err() {
        return false;
    }

    let child = Command::new(tool_path)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status();

    match tokio::time::timeout(VERSION_CHECK_TIMEOUT, child).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            tracing::debug!(tool = %tool_path, error = %e, "Media tool could not be started");
            false
        }
        Err(_) => {
            tracing::debug!(tool = %tool_path, "Media tool version check timed out");
            false
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaToolStatus {
    pub ffmpeg: bool,
    pub ffprobe: bool,
}

impl MediaToolStatus {
    pub fn all_available(&self) -> bool {
        self.ffmpeg && self.ffprobe
    }
}

pub async fn detect_media_tools(ffmpeg_path: &str, ffprobe_path: &str) -> MediaToolStatus {
    let (ffmpeg, ffprobe) = tokio::join!(check_tool(ffmpeg_path), check_tool(ffprobe_path));
    MediaToolStatus { ffmpeg, ffprobe }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_path_rejects_metacharacters() {
        assert!(validate_path("/srv/uploads/a/clip.mov").is_ok());
        assert!(validate_path("/srv/uploads/a/clip.mov; rm -rf /").is_err());
        assert!(validate_path("/srv/uploads/../etc/passwd").is_err());
    }

    #[test]
    fn test_validate_tool_path() {
        assert!(validate_tool_path("ffmpeg").is_ok());
        assert!(validate_tool_path("/usr/local/bin/ffmpeg").is_ok());
        assert!(validate_tool_path("ffmpeg -y").is_err());
        assert!(validate_tool_path("").is_err());
    }

    #[tokio::test]
    async fn test_check_tool_missing_binary() {
        assert!(!check_tool("/nonexistent/cutroom-ffmpeg").await);
    }
}
