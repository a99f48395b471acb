//! Durable index of cache entries, rewritten in full on every mutation.

use cutroom_core::CacheEntry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "cache_index.json";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheIndex {
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheIndex {
    /// Read the index at `path`.
    ///
    /// A missing file is an empty index. An unreadable or unparseable file is
    /// also treated as empty and logged; the next persist replaces it.
    pub async fn load(path: &Path) -> Self {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!(index = %path.display(), "No cache index found, starting empty");
                return Self::default();
            }
            Err(e) => {
                tracing::warn!(
                    index = %path.display(),
                    error = %e,
                    "Cache index unreadable, starting with an empty cache"
                );
                return Self::default();
            }
        };

        match serde_json::from_slice::<CacheIndex>(&bytes) {
            Ok(index) => {
                tracing::info!(
                    index = %path.display(),
                    entries = index.len(),
                    "Loaded cache index"
                );
                index
            }
            Err(e) => {
                tracing::warn!(
                    index = %path.display(),
                    error = %e,
                    "Cache index corrupt, starting with an empty cache"
                );
                Self::default()
            }
        }
    }

    /// Write the whole index to a sibling temp file and rename it into place.
    pub async fn persist(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(io::Error::other)?;
        let tmp = tmp_path(path);
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    pub fn insert(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(entry.cache_key.clone(), entry)
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.values().map(|e| e.size_bytes).sum()
    }

    pub fn keys_for_scope(&self, scope: &str) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.session_scope == scope)
            .map(|e| e.cache_key.clone())
            .collect()
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
