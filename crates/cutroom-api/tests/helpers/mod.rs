//! Test application with fake media tools.
//!
//! The transcoder writes a fixed number of bytes instead of running ffmpeg, so
//! the full upload, cache and eviction path runs without media binaries.

#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use cutroom_api::setup::{routes, services};
use cutroom_api::state::AppState;
use cutroom_core::{Config, MediaInfo, QualityTier};
use cutroom_processing::{EncodingProfile, MediaProber, MediaToolStatus, TranscodeFailure, Transcoder};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub struct FakeTranscoder {
    output_bytes: usize,
    fail_standard: bool,
    calls: AtomicUsize,
    inputs: Mutex<Vec<(PathBuf, QualityTier)>>,
}

impl FakeTranscoder {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<(PathBuf, QualityTier)> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn produce(
        &self,
        input: &Path,
        output: &Path,
        profile: &EncodingProfile,
    ) -> Result<PathBuf, TranscodeFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .unwrap()
            .push((input.to_path_buf(), profile.tier));

        if self.fail_standard && profile.tier == QualityTier::Standard {
            return Err(TranscodeFailure::NonZeroExit {
                code: Some(1),
                stderr_tail: "Error while opening encoder".to_string(),
            });
        }

        tokio::fs::write(output, vec![7u8; self.output_bytes])
            .await
            .map_err(TranscodeFailure::Io)?;
        Ok(output.to_path_buf())
    }
}

pub struct FakeProber;

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, path: &Path) -> Option<MediaInfo> {
        let size_bytes = tokio::fs::metadata(path).await.ok()?.len();
        Some(MediaInfo {
            duration_seconds: 12.5,
            width: 960,
            height: 540,
            size_bytes,
        })
    }
}

pub struct TestOptions {
    pub budget_bytes: u64,
    pub proxy_bytes: usize,
    pub fail_standard: bool,
    pub max_video_size_bytes: Option<usize>,
    /// Raw contents written to the index file before the store opens.
    pub index_contents: Option<Vec<u8>>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            budget_bytes: 100 * 1024 * 1024,
            proxy_bytes: 2048,
            fail_standard: false,
            max_video_size_bytes: None,
            index_contents: None,
        }
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub transcoder: Arc<FakeTranscoder>,
    pub config: Config,
    root: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(TestOptions::default()).await
    }

    pub async fn spawn_with(options: TestOptions) -> Self {
        let root = tempfile::tempdir().expect("Failed to create temp dir");
        Self::spawn_in(root, options).await
    }

    async fn spawn_in(root: TempDir, options: TestOptions) -> Self {
        let mut config = Config::with_upload_root(root.path().join("uploads"));
        config.0.cache_budget_bytes = options.budget_bytes;
        config.0.cleanup_interval_secs = 0;
        if let Some(max) = options.max_video_size_bytes {
            config.0.max_video_size_bytes = max;
        }

        if let Some(contents) = &options.index_contents {
            std::fs::create_dir_all(config.proxy_dir()).unwrap();
            std::fs::write(config.proxy_dir().join("cache_index.json"), contents).unwrap();
        }

        let transcoder = Arc::new(FakeTranscoder {
            output_bytes: options.proxy_bytes,
            fail_standard: options.fail_standard,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
        });

        let state = services::build_state(
            &config,
            transcoder.clone(),
            Arc::new(FakeProber),
            MediaToolStatus {
                ffmpeg: true,
                ffprobe: true,
            },
        )
        .await
        .expect("Failed to build state");

        let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
        let server =
            TestServer::new(app.into_make_service()).expect("Failed to create test server");

        TestApp {
            server,
            state,
            transcoder,
            config,
            root,
        }
    }

    /// New state and server over the same directories, as after a process restart.
    pub async fn restart(self) -> Self {
        let TestApp { root, .. } = self;
        Self::spawn_in(root, TestOptions::default()).await
    }

    pub fn upload_root(&self) -> &Path {
        self.config.upload_root()
    }

    pub async fn upload(&self, file_name: &str, data: Vec<u8>, session: Option<&str>) -> TestResponse {
        let part = Part::bytes(bytes::Bytes::from(data))
            .file_name(file_name)
            .mime_type("video/mp4");
        let form = MultipartForm::new().add_part("file", part);

        let request = self.server.post("/api/upload");
        let request = match session {
            Some(id) => request.add_header("X-Session-ID", id.to_string()),
            None => request,
        };
        request.multipart(form).await
    }
}

/// Deterministic fake video bytes; different seeds give different content.
pub fn video_bytes(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}
