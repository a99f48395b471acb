//! Cutroom Processing Library
//!
//! Wraps the external media tools (ffmpeg, ffprobe) and derives editing proxies
//! from uploaded videos, falling back to a cheaper encoding profile when the
//! standard one fails.

pub mod error;
pub mod tools;
pub mod video;

pub use error::{DerivationError, TranscodeFailure};
pub use tools::{detect_media_tools, MediaToolStatus};
pub use video::{
    BoundedProber, DeriveProxy, EncodingProfile, FfmpegTranscoder, FfprobeProber, MediaProber,
    ProxyDeriver, Transcoder,
};
