use std::io;
use std::time::Duration;

use cutroom_core::AppError;

/// Why a single transcode attempt did not produce an artifact.
#[derive(Debug, thiserror::Error)]
pub enum TranscodeFailure {
    #[error("media tool not found: {0}")]
    ToolMissing(String),

    #[error("failed to start media tool: {0}")]
    Spawn(#[source] io::Error),

    #[error("ffmpeg exited with status {code:?}: {stderr_tail}")]
    NonZeroExit {
        code: Option<i32>,
        stderr_tail: String,
    },

    #[error("transcode exceeded its {0:?} time budget")]
    TimedOut(Duration),

    #[error("transcode produced an empty output file")]
    EmptyOutput,

    #[error("invalid media path: {0}")]
    InvalidPath(String),

    #[error("transcode queue closed")]
    QueueClosed,

    #[error("I/O error during transcode: {0}")]
    Io(#[source] io::Error),
}

/// Both the standard and the fallback profile failed for one source.
#[derive(Debug, thiserror::Error)]
#[error("standard profile: {standard}; fallback profile: {fallback}")]
pub struct DerivationError {
    pub standard: TranscodeFailure,
    pub fallback: TranscodeFailure,
}

impl DerivationError {
    /// True when neither attempt could run because ffmpeg is not installed.
    pub fn tool_missing(&self) -> bool {
        matches!(self.standard, TranscodeFailure::ToolMissing(_))
            && matches!(self.fallback, TranscodeFailure::ToolMissing(_))
    }
}

impl From<DerivationError> for AppError {
    fn from(err: DerivationError) -> Self {
        if err.tool_missing() {
            AppError::MediaToolUnavailable(err.to_string())
        } else {
            AppError::DerivationFailed(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutroom_core::ErrorMetadata;

    #[test]
    fn test_derivation_error_keeps_both_reasons() {
        let err = DerivationError {
            standard: TranscodeFailure::TimedOut(Duration::from_secs(300)),
            fallback: TranscodeFailure::NonZeroExit {
                code: Some(1),
                stderr_tail: "Invalid data found when processing input".to_string(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("300s"));
        assert!(message.contains("Invalid data found"));

        let app: AppError = err.into();
        assert_eq!(app.error_code(), "PROXY_DERIVATION_FAILED");
    }

    #[test]
    fn test_missing_tool_maps_to_unavailable() {
        let err = DerivationError {
            standard: TranscodeFailure::ToolMissing("ffmpeg".to_string()),
            fallback: TranscodeFailure::ToolMissing("ffmpeg".to_string()),
        };
        let app: AppError = err.into();
        assert_eq!(app.http_status_code(), 503);
    }
}
