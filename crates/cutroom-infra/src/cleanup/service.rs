use cutroom_cache::{is_older_than, ContentStore, LeaseTracker};
use cutroom_core::SessionScope;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub upload_root: PathBuf,
    pub interval: Duration,
    /// Session upload directories older than this are removed.
    pub upload_max_age: Duration,
    /// Proxies not accessed within this age are removed.
    pub proxy_max_age: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub upload_dirs: usize,
    pub expired_proxies: usize,
    pub orphaned_files: usize,
}

/// Time-based sweep of abandoned upload sessions and stale proxies.
///
/// Leased sessions and proxies are left alone, and proxies are only removed
/// through the content store.
#[derive(Clone)]
pub struct CleanupService {
    store: Arc<ContentStore>,
    leases: LeaseTracker,
    config: CleanupConfig,
}

impl CleanupService {
    pub fn new(store: Arc<ContentStore>, leases: LeaseTracker, config: CleanupConfig) -> Self {
        Self {
            store,
            leases,
            config,
        }
    }

    /// Start the background sweep loop.
    /// Returns a JoinHandle for graceful shutdown
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut cleanup_interval = interval(self.config.interval);

            loop {
                cleanup_interval.tick().await;

                tracing::info!("Starting scheduled cleanup of uploads and proxies");
                let report = self.run_once().await;
                tracing::info!(
                    upload_dirs = report.upload_dirs,
                    expired_proxies = report.expired_proxies,
                    orphaned_files = report.orphaned_files,
                    "Cleanup completed"
                );
            }
        })
    }

    /// One full sweep. Failures of individual steps are logged and counted as zero.
    #[tracing::instrument(skip(self), fields(cleanup.operation = "sweep"))]
    pub async fn run_once(&self) -> CleanupReport {
        let upload_dirs = match self.cleanup_upload_dirs().await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to cleanup upload directories");
                0
            }
        };

        let expired_proxies = match self.store.expire_idle(self.config.proxy_max_age).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to expire idle proxies");
                0
            }
        };

        let orphaned_files = match self.store.sweep_orphans(self.config.proxy_max_age).await {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(error = %e, "Failed to remove orphaned proxy files");
                0
            }
        };

        CleanupReport {
            upload_dirs,
            expired_proxies,
            orphaned_files,
        }
    }

    #[tracing::instrument(skip(self), fields(cleanup.target = "uploads"))]
    async fn cleanup_upload_dirs(&self) -> Result<usize, anyhow::Error> {
        let root = &self.config.upload_root;
        let mut dir = match tokio::fs::read_dir(root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if self.is_proxy_dir(&path) {
                continue;
            }
            let metadata = match item.metadata().await {
                Ok(m) if m.is_dir() => m,
                _ => continue,
            };
            let Some(session_id) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if SessionScope::parse(session_id).is_err() {
                // Staging area and anything else that is not a session.
                continue;
            }
            if !is_older_than(&metadata, self.config.upload_max_age) {
                continue;
            }
            let Some(_reservation) = self.leases.try_reserve_session(session_id) else {
                tracing::debug!(session_id, "Skipping upload directory in use");
                continue;
            };
            // An upload may have finished between the listing and the reservation.
            match tokio::fs::metadata(&path).await {
                Ok(m) if is_older_than(&m, self.config.upload_max_age) => {}
                _ => continue,
            }

            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    tracing::info!(session_id, "Removed stale upload directory");
                    removed += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "Failed to remove upload directory")
                }
            }
        }

        Ok(removed)
    }

    fn is_proxy_dir(&self, path: &Path) -> bool {
        path == self.store.proxy_dir()
            || match (path.canonicalize(), self.store.proxy_dir().canonicalize()) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cutroom_cache::ContentStoreConfig;
    use cutroom_core::{ProxyArtifact, QualityTier, SessionScope};
    use cutroom_processing::{DerivationError, DeriveProxy};
    use tempfile::tempdir;

    struct WriteDeriver(PathBuf);

    #[async_trait]
    impl DeriveProxy for WriteDeriver {
        async fn derive_proxy(
            &self,
            _original: &Path,
            _scope: &SessionScope,
            artifact_stem: &str,
        ) -> Result<ProxyArtifact, DerivationError> {
            let file_name = format!("proxy_{artifact_stem}.mp4");
            let artifact_path = self.0.join(&file_name);
            std::fs::write(&artifact_path, b"proxy").unwrap();
            Ok(ProxyArtifact {
                artifact_path,
                file_name,
                size_bytes: 5,
                quality_tier: QualityTier::Standard,
                media: None,
            })
        }
    }

    async fn service(root: &Path, max_age: Duration) -> (CleanupService, Arc<ContentStore>, LeaseTracker) {
        let proxy_dir = root.join("proxies");
        std::fs::create_dir_all(&proxy_dir).unwrap();
        let leases = LeaseTracker::new();
        let store = Arc::new(
            ContentStore::open(
                ContentStoreConfig {
                    proxy_dir: proxy_dir.clone(),
                    web_prefix: "/static/proxies".to_string(),
                    budget_bytes: 1 << 30,
                },
                Arc::new(WriteDeriver(proxy_dir)),
                leases.clone(),
            )
            .await
            .unwrap(),
        );
        let service = CleanupService::new(
            store.clone(),
            leases.clone(),
            CleanupConfig {
                upload_root: root.to_path_buf(),
                interval: Duration::from_secs(3600),
                upload_max_age: max_age,
                proxy_max_age: max_age,
            },
        );
        (service, store, leases)
    }

    #[tokio::test]
    async fn test_sweep_removes_stale_sessions_and_proxies() {
        let root = tempdir().unwrap();
        let (service, store, _leases) = service(root.path(), Duration::from_millis(20)).await;

        let session_dir = root.path().join("session-a");
        std::fs::create_dir_all(&session_dir).unwrap();
        let source = session_dir.join("clip.mov");
        std::fs::write(&source, b"video").unwrap();
        let entry = store
            .get_or_create(&source, &SessionScope::parse("session-a").unwrap())
            .await
            .unwrap()
            .entry;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let report = service.run_once().await;

        assert_eq!(report.upload_dirs, 1);
        assert_eq!(report.expired_proxies, 1);
        assert!(!session_dir.exists());
        assert!(!entry.artifact_path.exists());
        assert!(store.proxy_dir().exists());
        assert!(store.index_path().exists());
    }

    #[tokio::test]
    async fn test_sweep_skips_leased_session_and_fresh_dirs() {
        let root = tempdir().unwrap();
        let (service, _store, leases) = service(root.path(), Duration::from_millis(200)).await;

        let busy = root.path().join("busy");
        std::fs::create_dir_all(&busy).unwrap();
        let _lease = leases.lease_session("busy").await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        let fresh = root.path().join("fresh");
        std::fs::create_dir_all(&fresh).unwrap();

        let report = service.run_once().await;
        assert_eq!(report.upload_dirs, 0);
        assert!(busy.exists());
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn test_sweep_leaves_staging_dir_and_releases_reservations() {
        let root = tempdir().unwrap();
        let (service, _store, leases) = service(root.path(), Duration::from_millis(20)).await;

        let staging = root.path().join(".incoming");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::create_dir_all(root.path().join("stale")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = service.run_once().await;
        assert_eq!(report.upload_dirs, 1);
        assert!(staging.exists());
        // A later upload for the swept session gets its lease straight away.
        assert!(leases.try_lease_session("stale").is_some());
    }

    #[tokio::test]
    async fn test_sweep_with_missing_upload_root() {
        let root = tempdir().unwrap();
        let (mut service, _store, _leases) = service(root.path(), Duration::from_secs(3600)).await;
        service.config.upload_root = root.path().join("does-not-exist");
        assert_eq!(service.run_once().await, CleanupReport::default());
    }
}
