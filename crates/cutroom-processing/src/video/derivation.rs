//! Proxy derivation - standard profile first, fallback profile on failure

use async_trait::async_trait;
use cutroom_core::{ProxyArtifact, SessionScope};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::probe::MediaProber;
use super::profile::EncodingProfile;
use super::transcoder::Transcoder;
use crate::error::{DerivationError, TranscodeFailure};

#[async_trait]
pub trait DeriveProxy: Send + Sync {
    /// Derive an editing proxy for `original`.
    ///
    /// `artifact_stem` names the output file; the tier prefix is prepended.
    async fn derive_proxy(
        &self,
        original: &Path,
        scope: &SessionScope,
        artifact_stem: &str,
    ) -> Result<ProxyArtifact, DerivationError>;
}

/// Runs TRY_STANDARD, then TRY_FALLBACK against the same original.
pub struct ProxyDeriver {
    transcoder: Arc<dyn Transcoder>,
    prober: Arc<dyn MediaProber>,
    output_dir: PathBuf,
    standard: EncodingProfile,
    fallback: EncodingProfile,
    transcode_permits: Arc<Semaphore>,
}

impl ProxyDeriver {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        prober: Arc<dyn MediaProber>,
        output_dir: PathBuf,
        max_concurrent_transcodes: usize,
    ) -> Self {
        Self {
            transcoder,
            prober,
            output_dir,
            standard: EncodingProfile::standard(),
            fallback: EncodingProfile::fallback(),
            transcode_permits: Arc::new(Semaphore::new(max_concurrent_transcodes.max(1))),
        }
    }

    pub fn with_profiles(mut self, standard: EncodingProfile, fallback: EncodingProfile) -> Self {
        self.standard = standard;
        self.fallback = fallback;
        self
    }

    async fn attempt(
        &self,
        original: &Path,
        profile: &EncodingProfile,
        artifact_stem: &str,
    ) -> Result<ProxyArtifact, TranscodeFailure> {
        let _permit = self
            .transcode_permits
            .acquire()
            .await
            .map_err(|_| TranscodeFailure::QueueClosed)?;

        let file_name = format!("{}_{}.mp4", profile.tier.file_prefix(), artifact_stem);
        let target = self.output_dir.join(&file_name);

        let artifact_path = self.transcoder.produce(original, &target, profile).await?;

        let size_bytes = tokio::fs::metadata(&artifact_path)
            .await
            .map_err(TranscodeFailure::Io)?
            .len();

        let media = self.prober.probe(&artifact_path).await;
        if media.is_none() {
            tracing::warn!(
                artifact = %artifact_path.display(),
                "Probe failed on derived proxy; caching without metadata"
            );
        }

        Ok(ProxyArtifact {
            artifact_path,
            file_name,
            size_bytes,
            quality_tier: profile.tier,
            media,
        })
    }
}

#[async_trait]
impl DeriveProxy for ProxyDeriver {
    #[tracing::instrument(skip(self, original), fields(
        session_id = %scope,
        original = %original.display()
    ))]
    async fn derive_proxy(
        &self,
        original: &Path,
        scope: &SessionScope,
        artifact_stem: &str,
    ) -> Result<ProxyArtifact, DerivationError> {
        tracing::info!(proxy.state = "TRY_STANDARD", proxy.tier = %self.standard.tier, "Deriving proxy");

        let standard = match self.attempt(original, &self.standard, artifact_stem).await {
            Ok(artifact) => {
                tracing::info!(
                    proxy.state = "SUCCESS",
                    proxy.tier = %artifact.quality_tier,
                    size_bytes = artifact.size_bytes,
                    "Proxy derived"
                );
                return Ok(artifact);
            }
            Err(e) => e,
        };

        tracing::warn!(
            proxy.state = "TRY_FALLBACK",
            proxy.tier = %self.fallback.tier,
            error = %standard,
            "Standard profile failed, retrying with fallback profile"
        );

        match self.attempt(original, &self.fallback, artifact_stem).await {
            Ok(artifact) => {
                tracing::info!(
                    proxy.state = "SUCCESS",
                    proxy.tier = %artifact.quality_tier,
                    size_bytes = artifact.size_bytes,
                    "Proxy derived with fallback profile"
                );
                Ok(artifact)
            }
            Err(fallback) => {
                tracing::error!(
                    proxy.state = "FAILED",
                    standard_error = %standard,
                    fallback_error = %fallback,
                    "Proxy derivation failed for both profiles"
                );
                Err(DerivationError { standard, fallback })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cutroom_core::{MediaInfo, QualityTier};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the `proxy.state` field of every event, in order.
    #[derive(Clone, Default)]
    struct StateLog(Arc<Mutex<Vec<String>>>);

    impl StateLog {
        fn states(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct StateVisitor(Option<String>);

    impl tracing::field::Visit for StateVisitor {
        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            if field.name() == "proxy.state" {
                self.0 = Some(value.to_string());
            }
        }

        fn record_debug(&mut self, _field: &tracing::field::Field, _value: &dyn std::fmt::Debug) {}
    }

    impl<S: tracing::Subscriber> Layer<S> for StateLog {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = StateVisitor(None);
            event.record(&mut visitor);
            if let Some(state) = visitor.0 {
                self.0.lock().unwrap().push(state);
            }
        }
    }

    /// Records every call; fails the tiers listed in `fail`.
    struct ScriptedTranscoder {
        fail: Vec<QualityTier>,
        calls: Mutex<Vec<(PathBuf, QualityTier)>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedTranscoder {
        fn failing(fail: Vec<QualityTier>) -> Self {
            Self {
                fail,
                calls: Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transcoder for ScriptedTranscoder {
        async fn produce(
            &self,
            input: &Path,
            output: &Path,
            profile: &EncodingProfile,
        ) -> Result<PathBuf, TranscodeFailure> {
            self.calls
                .lock()
                .unwrap()
                .push((input.to_path_buf(), profile.tier));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.contains(&profile.tier) {
                return Err(TranscodeFailure::TimedOut(profile.timeout));
            }
            tokio::fs::write(output, vec![0u8; 256])
                .await
                .map_err(TranscodeFailure::Io)?;
            Ok(output.to_path_buf())
        }
    }

    struct FixedProber(Option<MediaInfo>);

    #[async_trait]
    impl MediaProber for FixedProber {
        async fn probe(&self, _path: &Path) -> Option<MediaInfo> {
            self.0
        }
    }

    fn deriver(transcoder: Arc<ScriptedTranscoder>, dir: &Path, media: Option<MediaInfo>) -> ProxyDeriver {
        ProxyDeriver::new(transcoder, Arc::new(FixedProber(media)), dir.to_path_buf(), 2)
    }

    fn scope() -> SessionScope {
        SessionScope::parse("session-1").unwrap()
    }

    #[tokio::test]
    async fn test_standard_success_never_tries_fallback() {
        let dir = tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::failing(vec![]));
        let info = MediaInfo {
            duration_seconds: 4.0,
            width: 960,
            height: 540,
            size_bytes: 256,
        };
        let deriver = deriver(transcoder.clone(), dir.path(), Some(info));
        let original = dir.path().join("clip.mov");

        let artifact = deriver
            .derive_proxy(&original, &scope(), "session-1_abc")
            .await
            .unwrap();

        assert_eq!(artifact.quality_tier, QualityTier::Standard);
        assert_eq!(artifact.file_name, "proxy_session-1_abc.mp4");
        assert_eq!(artifact.size_bytes, 256);
        assert_eq!(artifact.resolution(), "960x540");
        assert_eq!(transcoder.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_uses_same_original() {
        let dir = tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::failing(vec![QualityTier::Standard]));
        let deriver = deriver(transcoder.clone(), dir.path(), None);
        let original = dir.path().join("clip.mov");
        let log = StateLog::default();
        let _subscriber =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(log.clone()));

        let artifact = deriver
            .derive_proxy(&original, &scope(), "session-1_abc")
            .await
            .unwrap();

        assert_eq!(log.states(), vec!["TRY_STANDARD", "TRY_FALLBACK", "SUCCESS"]);
        assert_eq!(artifact.quality_tier, QualityTier::Fallback);
        assert_eq!(artifact.file_name, "fallback_session-1_abc.mp4");
        assert!(artifact.media.is_none());
        assert_eq!(artifact.duration_seconds(), 0.0);

        let calls = transcoder.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                (original.clone(), QualityTier::Standard),
                (original.clone(), QualityTier::Fallback)
            ]
        );
        assert!(!dir.path().join("proxy_session-1_abc.mp4").exists());
    }

    #[tokio::test]
    async fn test_both_profiles_fail() {
        let dir = tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::failing(vec![
            QualityTier::Standard,
            QualityTier::Fallback,
        ]));
        let deriver = deriver(transcoder.clone(), dir.path(), None);

        let err = deriver
            .derive_proxy(&dir.path().join("clip.mov"), &scope(), "stem")
            .await
            .unwrap_err();

        assert!(matches!(err.standard, TranscodeFailure::TimedOut(_)));
        assert!(matches!(err.fallback, TranscodeFailure::TimedOut(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_transcode_concurrency_is_bounded() {
        let dir = tempdir().unwrap();
        let transcoder = Arc::new(ScriptedTranscoder::failing(vec![]));
        let deriver = Arc::new(deriver(transcoder.clone(), dir.path(), None));

        let mut handles = Vec::new();
        for i in 0..6 {
            let deriver = deriver.clone();
            let original = dir.path().join(format!("clip{i}.mov"));
            handles.push(tokio::spawn(async move {
                deriver
                    .derive_proxy(&original, &scope(), &format!("stem{i}"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(transcoder.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(transcoder.calls.lock().unwrap().len(), 6);
    }
}
