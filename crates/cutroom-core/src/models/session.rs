use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

const MAX_SCOPE_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid session id '{0}': expected 1-128 ASCII letters, digits or '-'")]
pub struct InvalidSessionScope(pub String);

/// Validated session identifier used to scope cache keys and upload directories.
///
/// The alphabet excludes `_` and path separators, so a scope can be embedded in
/// a cache key or a directory name without ambiguity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionScope(String);

impl SessionScope {
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionScope> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SCOPE_LEN
            && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if valid {
            Ok(SessionScope(raw.to_string()))
        } else {
            Err(InvalidSessionScope(raw.to_string()))
        }
    }

    /// Fresh random scope for a new upload session.
    pub fn generate() -> Self {
        SessionScope(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionScope {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Per-session editing record stored as `session.json` in the upload directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditSession {
    pub session_id: String,
    pub original_filename: String,
    pub original_path: PathBuf,
    pub original_size: u64,
    pub original_duration: f64,
    pub original_resolution: String,
    pub cache_key: String,
    pub proxy_url: String,
    pub proxy_size_mb: f64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub edit_instructions: Vec<JsonValue>,
    #[serde(default)]
    pub last_edit: Option<DateTime<Utc>>,
}
