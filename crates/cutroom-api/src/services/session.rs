//! Edit session records, one `session.json` per upload directory.
//!
//! The record lives and dies with the session directory: the upload sweep and
//! `DELETE /api/sessions/{id}` remove both together.

use chrono::Utc;
use cutroom_core::{AppError, EditSession, SessionScope};
use serde_json::Value as JsonValue;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::constants::{SESSION_FILE_NAME, STAGING_DIR_NAME};

#[derive(Debug)]
pub struct SessionRegistry {
    upload_root: PathBuf,
    proxy_dir: PathBuf,
    /// Serializes read-modify-write cycles on session files.
    write_lock: Mutex<()>,
}

impl SessionRegistry {
    pub fn new(upload_root: PathBuf, proxy_dir: PathBuf) -> Self {
        Self {
            upload_root,
            proxy_dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn upload_root(&self) -> &Path {
        &self.upload_root
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.upload_root.join(STAGING_DIR_NAME)
    }

    /// Upload directory of `scope`.
    ///
    /// Fails for a scope that would land on the proxy directory.
    pub fn session_dir(&self, scope: &SessionScope) -> Result<PathBuf, AppError> {
        let dir = self.upload_root.join(scope.as_str());
        if dir == self.proxy_dir {
            return Err(AppError::InvalidInput(format!(
                "Session id '{}' is reserved",
                scope
            )));
        }
        Ok(dir)
    }

    fn session_file(&self, scope: &SessionScope) -> Result<PathBuf, AppError> {
        Ok(self.session_dir(scope)?.join(SESSION_FILE_NAME))
    }

    pub async fn save(&self, scope: &SessionScope, session: &EditSession) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.write(scope, session).await
    }

    async fn write(&self, scope: &SessionScope, session: &EditSession) -> Result<(), AppError> {
        let path = self.session_file(scope)?;
        let json = serde_json::to_vec_pretty(session)
            .map_err(|e| AppError::Internal(format!("Failed to encode session record: {}", e)))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// `None` when the session has no record.
    pub async fn load(&self, scope: &SessionScope) -> Result<Option<EditSession>, AppError> {
        let path = self.session_file(scope)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session = serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(session_id = %scope, error = %e, "Session record unreadable");
            AppError::Internal(format!("Session record for '{}' is corrupt", scope))
        })?;
        Ok(Some(session))
    }

    /// Replace the stored edit instructions.
    pub async fn record_edits(
        &self,
        scope: &SessionScope,
        edits: Vec<JsonValue>,
    ) -> Result<Option<EditSession>, AppError> {
        let _guard = self.write_lock.lock().await;
        let Some(mut session) = self.load(scope).await? else {
            return Ok(None);
        };
        session.edit_instructions = edits;
        session.last_edit = Some(Utc::now());
        self.write(scope, &session).await?;
        Ok(Some(session))
    }

    /// Copy the original into the session directory as
    /// `export_{session}_{unix_ts}.mp4` and return the file name.
    ///
    /// Edit instructions are not rendered; the export is the original at full
    /// quality.
    pub async fn export_original(&self, scope: &SessionScope) -> Result<String, AppError> {
        let session = self
            .load(scope)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Session '{}' not found", scope)))?;

        if !tokio::fs::try_exists(&session.original_path)
            .await
            .unwrap_or(false)
        {
            return Err(AppError::NotFound(
                "Original video no longer available".to_string(),
            ));
        }

        let file_name = format!("export_{}_{}.mp4", scope, Utc::now().timestamp());
        let target = self.session_dir(scope)?.join(&file_name);
        tokio::fs::copy(&session.original_path, &target).await?;

        tracing::info!(
            session_id = %scope,
            export = %file_name,
            edits = session.edit_instructions.len(),
            "Export created from original"
        );
        Ok(file_name)
    }

    /// Path of a finished export of `scope`.
    ///
    /// Only names produced by [`Self::export_original`] resolve; originals,
    /// the session record and anything outside the directory are NotFound.
    pub fn export_path(&self, scope: &SessionScope, file_name: &str) -> Result<PathBuf, AppError> {
        let prefix = format!("export_{}_", scope);
        let is_export = file_name
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".mp4"))
            .is_some_and(|ts| !ts.is_empty() && ts.bytes().all(|b| b.is_ascii_digit()));
        if !is_export {
            return Err(AppError::NotFound(format!("Export '{}' not found", file_name)));
        }
        Ok(self.session_dir(scope)?.join(file_name))
    }

    /// Remove the session directory with its record and original.
    /// Returns whether anything existed.
    pub async fn remove(&self, scope: &SessionScope) -> Result<bool, AppError> {
        let dir = self.session_dir(scope)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
