use cutroom_core::QualityTier;
use std::path::Path;
use std::time::Duration;

/// Target encoding for one proxy attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingProfile {
    pub tier: QualityTier,
    pub video_codec: &'static str,
    pub preset: &'static str,
    /// Constant rate factor; higher is smaller.
    pub crf: u8,
    /// Output width in pixels; height follows the aspect ratio.
    pub scale_width: u32,
    pub frame_rate: u32,
    pub audio_codec: &'static str,
    pub audio_bitrate_kbps: u32,
    /// Move the moov atom to the front for progressive playback.
    pub faststart: bool,
    pub threads: u32,
    pub timeout: Duration,
}

impl EncodingProfile {
    pub fn standard() -> Self {
        Self {
            tier: QualityTier::Standard,
            video_codec: "libx264",
            preset: "ultrafast",
            crf: 28,
            scale_width: 960,
            frame_rate: 15,
            audio_codec: "aac",
            audio_bitrate_kbps: 64,
            faststart: true,
            threads: 2,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn fallback() -> Self {
        Self {
            tier: QualityTier::Fallback,
            video_codec: "libx264",
            preset: "superfast",
            crf: 32,
            scale_width: 480,
            frame_rate: 10,
            audio_codec: "aac",
            audio_bitrate_kbps: 32,
            faststart: true,
            threads: 2,
            timeout: Duration::from_secs(180),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// ffmpeg arguments that encode `input` into an MP4 at `output`.
    pub fn ffmpeg_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
        ];

        args.extend_from_slice(&[
            "-c:v".to_string(),
            self.video_codec.to_string(),
            "-preset".to_string(),
            self.preset.to_string(),
            "-crf".to_string(),
            self.crf.to_string(),
            "-vf".to_string(),
            format!("scale={}:-2", self.scale_width),
            "-r".to_string(),
            self.frame_rate.to_string(),
        ]);

        args.extend_from_slice(&[
            "-c:a".to_string(),
            self.audio_codec.to_string(),
            "-b:a".to_string(),
            format!("{}k", self.audio_bitrate_kbps),
        ]);

        if self.faststart {
            args.extend_from_slice(&["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend_from_slice(&["-threads".to_string(), self.threads.to_string()]);

        // Output goes to a temporary name, so the container must be explicit.
        args.extend_from_slice(&["-f".to_string(), "mp4".to_string()]);
        args.push(output.to_string_lossy().to_string());

        args
    }
}
