//! Content store - maps (source file, session) to a cached proxy.
//!
//! The index lives behind one `RwLock`. Every mutation holds the write guard
//! across "mutate, persist" so rewrites of the index file never interleave.

use chrono::Utc;
use cutroom_core::{CacheEntry, CacheStats, ProxyArtifact, SessionScope};
use cutroom_processing::DeriveProxy;
use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::age::is_older_than;
use crate::error::CacheError;
use crate::eviction::select_victims;
use crate::index::{CacheIndex, INDEX_FILE_NAME};
use crate::key::{cache_key, hash_file};
use crate::lease::{Lease, LeaseTracker};

#[derive(Debug, Clone)]
pub struct ContentStoreConfig {
    pub proxy_dir: PathBuf,
    /// URL prefix under which `proxy_dir` is served.
    pub web_prefix: String,
    pub budget_bytes: u64,
}

/// Result of [`ContentStore::get_or_create`].
///
/// The lease keeps the entry out of eviction until the caller drops it.
#[derive(Debug)]
pub struct CacheLookup {
    pub entry: CacheEntry,
    pub hit: bool,
    pub lease: Lease,
}

type DerivationSlot = Arc<tokio::sync::Mutex<()>>;
type InFlight = Mutex<HashMap<String, DerivationSlot>>;

/// A caller's share of the per-key derivation mutex. The map entry goes away
/// with the last handle.
struct SlotHandle<'a> {
    in_flight: &'a InFlight,
    key: &'a str,
    slot: DerivationSlot,
}

impl<'a> SlotHandle<'a> {
    fn acquire(in_flight: &'a InFlight, key: &'a str) -> Self {
        let mut map = in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let slot = map.entry(key.to_string()).or_default().clone();
        Self {
            in_flight,
            key,
            slot,
        }
    }

    fn mutex(&self) -> &tokio::sync::Mutex<()> {
        &self.slot
    }
}

impl Drop for SlotHandle<'_> {
    fn drop(&mut self) {
        let mut map = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // The map and this handle are the only holders: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            map.remove(self.key);
        }
    }
}

pub struct ContentStore {
    config: ContentStoreConfig,
    index_path: PathBuf,
    index: RwLock<CacheIndex>,
    deriver: Arc<dyn DeriveProxy>,
    leases: LeaseTracker,
    in_flight: InFlight,
}

impl ContentStore {
    /// Open the store rooted at `config.proxy_dir`, loading its index.
    ///
    /// Entries whose artifacts have disappeared are kept until they are next
    /// looked up.
    pub async fn open(
        config: ContentStoreConfig,
        deriver: Arc<dyn DeriveProxy>,
        leases: LeaseTracker,
    ) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(&config.proxy_dir).await?;
        let index_path = config.proxy_dir.join(INDEX_FILE_NAME);
        let index = CacheIndex::load(&index_path).await;

        tracing::info!(
            proxy_dir = %config.proxy_dir.display(),
            budget_bytes = config.budget_bytes,
            entries = index.len(),
            total_bytes = index.total_bytes(),
            "Content store opened"
        );

        Ok(Self {
            config,
            index_path,
            index: RwLock::new(index),
            deriver,
            leases,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    pub fn proxy_dir(&self) -> &Path {
        &self.config.proxy_dir
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    pub fn leases(&self) -> &LeaseTracker {
        &self.leases
    }

    /// Return the cached proxy for `source` in `scope`, deriving it on a miss.
    ///
    /// Concurrent calls for the same key wait for the first derivation and
    /// then see its entry as a hit.
    #[tracing::instrument(skip(self, source), fields(session_id = %scope, source = %source.display()))]
    pub async fn get_or_create(
        &self,
        source: &Path,
        scope: &SessionScope,
    ) -> Result<CacheLookup, CacheError> {
        let content_hash = hash_file(source).await?;
        let key = cache_key(scope, &content_hash);
        let lease = self.leases.lease_entry(&key);

        // Dropped on every exit, including a cancelled request future.
        let slot = SlotHandle::acquire(&self.in_flight, &key);
        let (entry, hit) = {
            let _guard = slot.mutex().lock().await;
            self.lookup_or_derive(source, scope, &key).await?
        };
        Ok(CacheLookup { entry, hit, lease })
    }

    async fn lookup_or_derive(
        &self,
        source: &Path,
        scope: &SessionScope,
        key: &str,
    ) -> Result<(CacheEntry, bool), CacheError> {
        if let Some(entry) = self.touch(key).await? {
            tracing::info!(cache_key = %key, "Cache hit");
            return Ok((entry, true));
        }

        tracing::info!(cache_key = %key, "Cache miss, deriving proxy");
        let artifact = self.deriver.derive_proxy(source, scope, key).await?;
        let entry = self.insert(key, scope, source, artifact).await?;
        Ok((entry, false))
    }

    /// Mark `key` as accessed if its artifact is still on disk.
    ///
    /// A registered key whose file is gone is purged in the same operation.
    async fn touch(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut index = self.index.write().await;
        let Some(artifact_path) = index.get(key).map(|e| e.artifact_path.clone()) else {
            return Ok(None);
        };

        if !tokio::fs::try_exists(&artifact_path).await.unwrap_or(false) {
            tracing::warn!(
                cache_key = %key,
                artifact = %artifact_path.display(),
                "Cached artifact missing on disk, purging entry"
            );
            index.remove(key);
            self.persist(&index).await?;
            return Ok(None);
        }

        let entry = match index.get_mut(key) {
            Some(entry) => {
                entry.last_accessed_at = Utc::now();
                entry.clone()
            }
            None => return Ok(None),
        };
        self.persist(&index).await?;
        Ok(Some(entry))
    }

    async fn insert(
        &self,
        key: &str,
        scope: &SessionScope,
        source: &Path,
        artifact: ProxyArtifact,
    ) -> Result<CacheEntry, CacheError> {
        let now = Utc::now();
        let entry = CacheEntry {
            cache_key: key.to_string(),
            session_scope: scope.to_string(),
            source_path: source.to_path_buf(),
            web_reference: self.web_reference(&artifact.file_name),
            size_bytes: artifact.size_bytes,
            duration_seconds: artifact.duration_seconds(),
            resolution: artifact.resolution(),
            quality_tier: artifact.quality_tier,
            artifact_path: artifact.artifact_path,
            created_at: now,
            last_accessed_at: now,
        };

        let mut index = self.index.write().await;
        if let Some(previous) = index.insert(entry.clone()) {
            if previous.artifact_path != entry.artifact_path {
                remove_artifact(&previous).await;
            }
        }
        tracing::info!(
            cache_key = %key,
            size_bytes = entry.size_bytes,
            proxy.tier = %entry.quality_tier,
            "Cached new proxy"
        );

        self.enforce_budget(&mut index).await;
        self.persist(&index).await?;
        Ok(entry)
    }

    /// Evict least-recently-accessed unleased entries until the index fits
    /// the budget. Callers hold the write guard and persist afterwards.
    async fn enforce_budget(&self, index: &mut CacheIndex) -> usize {
        let victims = select_victims(index, self.config.budget_bytes, |k| {
            self.leases.is_entry_leased(k)
        });

        for key in &victims {
            if let Some(entry) = self.delete_entry(index, key).await {
                tracing::info!(
                    cache_key = %key,
                    size_bytes = entry.size_bytes,
                    last_accessed_at = %entry.last_accessed_at,
                    "Evicted proxy"
                );
            }
        }

        let total = index.total_bytes();
        if total > self.config.budget_bytes {
            tracing::warn!(
                total_bytes = total,
                budget_bytes = self.config.budget_bytes,
                entries = index.len(),
                "Cache over budget; remaining entries are in use"
            );
        }
        victims.len()
    }

    /// The single delete path: drop the entry from the index and its file
    /// from disk.
    async fn delete_entry(&self, index: &mut CacheIndex, key: &str) -> Option<CacheEntry> {
        let entry = index.remove(key)?;
        remove_artifact(&entry).await;
        Some(entry)
    }

    /// Delete every entry of `scope` along with its files.
    ///
    /// Returns the number of entries removed; an unknown scope removes nothing
    /// and leaves the index file untouched.
    pub async fn remove_session(&self, scope: &SessionScope) -> Result<usize, CacheError> {
        let mut index = self.index.write().await;
        let keys = index.keys_for_scope(scope.as_str());
        if keys.is_empty() {
            return Ok(0);
        }

        for key in &keys {
            self.delete_entry(&mut index, key).await;
        }
        self.persist(&index).await?;

        tracing::info!(session_id = %scope, removed = keys.len(), "Removed session proxies");
        Ok(keys.len())
    }

    pub async fn stats(&self) -> CacheStats {
        let index = self.index.read().await;
        CacheStats::new(index.total_bytes(), index.len(), self.config.budget_bytes)
    }

    pub async fn lookup(&self, key: &str) -> Option<CacheEntry> {
        self.index.read().await.get(key).cloned()
    }

    /// Lease the entry whose artifact is named `file_name`, for serving.
    ///
    /// Returns `None` when no entry owns that file or its artifact is gone;
    /// in the latter case the entry is purged.
    pub async fn checkout(
        &self,
        file_name: &str,
    ) -> Result<Option<(CacheEntry, Lease)>, CacheError> {
        let (entry, lease) = {
            let index = self.index.read().await;
            let Some(entry) = index
                .iter()
                .find(|e| e.file_name() == Some(file_name))
                .cloned()
            else {
                return Ok(None);
            };
            // Taken under the read guard so eviction cannot slip in between.
            let lease = self.leases.lease_entry(&entry.cache_key);
            (entry, lease)
        };

        if tokio::fs::try_exists(&entry.artifact_path)
            .await
            .unwrap_or(false)
        {
            return Ok(Some((entry, lease)));
        }

        drop(lease);
        let mut index = self.index.write().await;
        if index.remove(&entry.cache_key).is_some() {
            tracing::warn!(cache_key = %entry.cache_key, "Served artifact missing on disk, purging entry");
            self.persist(&index).await?;
        }
        Ok(None)
    }

    /// Remove unleased entries not accessed within `max_age`.
    pub async fn expire_idle(&self, max_age: Duration) -> Result<usize, CacheError> {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };

        let mut index = self.index.write().await;
        let expired: Vec<String> = index
            .iter()
            .filter(|e| e.last_accessed_at < cutoff && !self.leases.is_entry_leased(&e.cache_key))
            .map(|e| e.cache_key.clone())
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }

        for key in &expired {
            self.delete_entry(&mut index, key).await;
        }
        self.persist(&index).await?;
        Ok(expired.len())
    }

    /// Delete files in the proxy directory that no entry references and that
    /// have not been modified within `max_age`.
    pub async fn sweep_orphans(&self, max_age: Duration) -> Result<usize, CacheError> {
        let index = self.index.read().await;
        // By file name: the proxy dir may be spelled differently than when
        // the entries were written.
        let referenced: HashSet<OsString> = index
            .iter()
            .filter_map(|e| e.artifact_path.file_name().map(|n| n.to_os_string()))
            .collect();

        let mut removed = 0;
        let mut dir = tokio::fs::read_dir(&self.config.proxy_dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let name = item.file_name();
            if name == INDEX_FILE_NAME || referenced.contains(&name) {
                continue;
            }
            let metadata = match item.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            if !is_older_than(&metadata, max_age) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "Failed to remove orphaned proxy")
                }
            }
        }
        Ok(removed)
    }

    fn web_reference(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.config.web_prefix.trim_end_matches('/'),
            file_name
        )
    }

    async fn persist(&self, index: &CacheIndex) -> Result<(), CacheError> {
        index.persist(&self.index_path).await.map_err(|e| {
            tracing::error!(index = %self.index_path.display(), error = %e, "Failed to persist cache index");
            CacheError::Persist(e)
        })
    }
}

/// Missing files count as removed; another path got there first.
async fn remove_artifact(entry: &CacheEntry) {
    match tokio::fs::remove_file(&entry.artifact_path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(cache_key = %entry.cache_key, "Artifact already gone");
        }
        Err(e) => {
            tracing::warn!(
                cache_key = %entry.cache_key,
                artifact = %entry.artifact_path.display(),
                error = %e,
                "Failed to delete artifact"
            );
        }
    }
}
