//! Multipart upload intake: extension check, filename hygiene and streaming
//! the body to disk under a size cap.

use axum::extract::Multipart;
use cutroom_core::AppError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::constants::BYTES_PER_MB;

/// Lowercased extension of `filename` if it is an accepted video format.
pub fn validate_video_extension(
    filename: &str,
    allowed_extensions: &[String],
) -> Result<String, AppError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if extension.is_empty() || !allowed_extensions.contains(&extension) {
        let shown = if extension.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{}", extension)
        };
        return Err(AppError::UnsupportedFormat(shown));
    }

    Ok(extension)
}

/// Strip directories and replace characters outside `[A-Za-z0-9._-]`.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    let filename_only = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return Err(AppError::InvalidInput(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(|c| c == '_' || c == '.').is_empty() {
        return Err(AppError::InvalidInput("Filename is empty".to_string()));
    }

    Ok(sanitized)
}

/// Megabytes rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

/// A request body written to the staging directory.
///
/// Removed on drop unless moved into place with [`StagedFile::persist_to`].
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    persisted: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn persist_to(mut self, target: &Path) -> std::io::Result<()> {
        tokio::fs::rename(&self.path, target).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[derive(Debug)]
pub struct ReceivedUpload {
    /// Sanitized client file name.
    pub filename: String,
    pub staged: StagedFile,
    pub size_bytes: u64,
    /// `session_id` form field, when sent.
    pub session_field: Option<String>,
}

/// Read the multipart body: exactly one `file` field, optionally a
/// `session_id` field.
///
/// The extension is checked before any bytes are written; the file is
/// streamed to `staging_dir` and rejected once it exceeds `max_size`.
pub async fn receive_upload(
    mut multipart: Multipart,
    allowed_extensions: &[String],
    max_size: usize,
    staging_dir: &Path,
) -> Result<ReceivedUpload, AppError> {
    let mut file: Option<(String, StagedFile, u64)> = None;
    let mut session_field: Option<String> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Failed to read multipart: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                if file.is_some() {
                    return Err(AppError::InvalidInput(
                        "Multiple file fields are not allowed; send exactly one field named 'file'"
                            .to_string(),
                    ));
                }

                let raw_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| AppError::InvalidInput("No selected file".to_string()))?;
                let filename = sanitize_filename(&raw_name)?;
                validate_video_extension(&filename, allowed_extensions)?;

                tokio::fs::create_dir_all(staging_dir).await?;
                let staged = StagedFile {
                    path: staging_dir.join(format!("{}.part", uuid::Uuid::new_v4())),
                    persisted: false,
                };
                let mut out = tokio::fs::File::create(staged.path()).await?;
                let mut written: u64 = 0;

                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read file data: {}", e)))?
                {
                    written += chunk.len() as u64;
                    if written > max_size as u64 {
                        return Err(AppError::PayloadTooLarge(format!(
                            "File size exceeds maximum allowed size of {} MB",
                            max_size / 1024 / 1024
                        )));
                    }
                    out.write_all(&chunk).await?;
                }
                out.flush().await?;

                file = Some((filename, staged, written));
            }
            "session_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::InvalidInput(format!("Failed to read session_id: {}", e)))?;
                let value = value.trim().to_string();
                if !value.is_empty() {
                    session_field = Some(value);
                }
            }
            _ => {}
        }
    }

    let (filename, staged, size_bytes) =
        file.ok_or_else(|| AppError::InvalidInput("No file uploaded".to_string()))?;

    Ok(ReceivedUpload {
        filename,
        staged,
        size_bytes,
        session_field,
    })
}
