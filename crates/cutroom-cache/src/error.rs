use std::io;
use std::path::PathBuf;

use cutroom_core::AppError;
use cutroom_processing::DerivationError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error("failed to persist cache index: {0}")]
    Persist(#[source] io::Error),

    #[error("cache I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Hash { path, source } => {
                AppError::HashComputation(format!("{}: {}", path.display(), source))
            }
            CacheError::Derivation(e) => e.into(),
            CacheError::Persist(e) => AppError::Internal(format!("cache index: {}", e)),
            CacheError::Io(e) => e.into(),
        }
    }
}
