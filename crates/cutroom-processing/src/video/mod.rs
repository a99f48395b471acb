//! Video proxy derivation: encoding profiles, the ffmpeg invoker, the ffprobe
//! probe and the standard/fallback state machine.

pub mod derivation;
pub mod probe;
pub mod profile;
pub mod transcoder;

pub use derivation::{DeriveProxy, ProxyDeriver};
pub use probe::{parse_probe_output, BoundedProber, FfprobeProber, MediaProber};
pub use profile::EncodingProfile;
pub use transcoder::{FfmpegTranscoder, Transcoder};
