use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Structural metadata read from a media file by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    pub duration_seconds: f64,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
}

impl MediaInfo {
    /// `WIDTHxHEIGHT`, or `unknown` when the probe reported no dimensions.
    pub fn resolution(&self) -> String {
        if self.width == 0 || self.height == 0 {
            "unknown".to_string()
        } else {
            format!("{}x{}", self.width, self.height)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_formatting() {
        let info = MediaInfo {
            duration_seconds: 12.5,
            width: 960,
            height: 540,
            size_bytes: 1024,
        };
        assert_eq!(info.resolution(), "960x540");

        let blank = MediaInfo {
            width: 0,
            ..info
        };
        assert_eq!(blank.resolution(), "unknown");
    }
}
