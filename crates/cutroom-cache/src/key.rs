//! Content hashing and cache key construction.

use cutroom_core::SessionScope;
use sha2::{Digest, Sha256};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Read size for hashing; sources are never loaded whole.
pub const HASH_CHUNK_BYTES: usize = 64 * 1024;

fn hash_file_blocking(path: &Path) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_BYTES];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex SHA-256 of the file at `path`, computed on the blocking pool.
pub async fn hash_file(path: &Path) -> Result<String, CacheError> {
    let owned: PathBuf = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || hash_file_blocking(&owned)).await;
    match result {
        Ok(Ok(hash)) => Ok(hash),
        Ok(Err(source)) => Err(CacheError::Hash {
            path: path.to_path_buf(),
            source,
        }),
        Err(join) => Err(CacheError::Hash {
            path: path.to_path_buf(),
            source: io::Error::other(join.to_string()),
        }),
    }
}

/// `{scope}_{hash}`. Scopes cannot contain `_` and hashes are fixed width, so
/// distinct (scope, hash) pairs never produce the same key.
pub fn cache_key(scope: &SessionScope, content_hash: &str) -> String {
    format!("{}_{}", scope, content_hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_hash_matches_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            hash_file(&path).await.unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_hash_spans_multiple_chunks() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        let mut data = vec![7u8; HASH_CHUNK_BYTES * 3 + 17];
        std::fs::write(&a, &data).unwrap();
        *data.last_mut().unwrap() = 8;
        std::fs::write(&b, &data).unwrap();

        let hash_a = hash_file(&a).await.unwrap();
        assert_eq!(hash_a.len(), 64);
        assert_ne!(hash_a, hash_file(&b).await.unwrap());
    }

    #[tokio::test]
    async fn test_hash_missing_file() {
        let err = hash_file(Path::new("/nonexistent/clip.mov")).await.unwrap_err();
        assert!(matches!(err, CacheError::Hash { .. }));
    }

    #[test]
    fn test_key_includes_scope() {
        let hash = "0".repeat(64);
        let a = cache_key(&SessionScope::parse("alpha").unwrap(), &hash);
        let b = cache_key(&SessionScope::parse("beta").unwrap(), &hash);
        assert_ne!(a, b);
        assert!(a.starts_with("alpha_"));
    }
}
