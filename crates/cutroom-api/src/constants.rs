//! API constants

/// Header carrying the editing session; echoed on upload responses.
pub const SESSION_ID_HEADER: &str = "X-Session-ID";

/// Per-session edit record inside the session's upload directory.
pub const SESSION_FILE_NAME: &str = "session.json";

/// Directory under the upload root where request bodies are staged before
/// the session is known.
pub const STAGING_DIR_NAME: &str = ".incoming";

/// Room for multipart framing on top of the video size cap.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
