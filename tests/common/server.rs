//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own media and temp
//! directories, and a fake audio engine in place of ffmpeg.

use super::constants::*;
use super::fixtures::encode_tag;
use async_trait::async_trait;
use id3::{Tag, TagLike};
use mixtape_server::config::{AppConfig, CliConfig};
use mixtape_server::merge::{AudioEngine, EngineError, RenderJob};
use mixtape_server::server::{build_state, make_app};
use mixtape_server::RequestsLoggingLevel;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Audio engine stand-in that records every job.
///
/// A succeeding engine writes a small MP3 to the job's output path, tagged
/// with `output_artist` when set. A failing engine writes a partial file and
/// reports a non-zero exit.
#[derive(Default)]
pub struct FakeEngine {
    jobs: Mutex<Vec<RenderJob>>,
    fail: bool,
    output_artist: Option<String>,
}

impl FakeEngine {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_output_artist(mut self, artist: &str) -> Self {
        self.output_artist = Some(artist.to_string());
        self
    }

    /// Jobs received so far, in submission order
    pub fn jobs(&self) -> Vec<RenderJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl AudioEngine for FakeEngine {
    async fn render(&self, job: &RenderJob) -> Result<(), EngineError> {
        self.jobs.lock().unwrap().push(job.clone());

        if self.fail {
            tokio::fs::write(&job.output, b"partial").await?;
            return Err(EngineError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "Error initializing complex filters".to_string(),
            });
        }

        let mut tag = Tag::new();
        if let Some(artist) = &self.output_artist {
            tag.set_artist(artist.clone());
        }
        tokio::fs::write(&job.output, encode_tag(&tag)).await?;
        Ok(())
    }
}

/// Test server instance with isolated media directories
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// The engine merges are rendered with
    pub engine: Arc<FakeEngine>,

    pub images_dir: PathBuf,
    pub audio_dir: PathBuf,
    pub temp_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_media_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server with a succeeding engine
    pub async fn spawn() -> Self {
        Self::spawn_with_engine(FakeEngine::succeeding()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the configuration does not resolve, the port cannot be
    /// bound, or the server doesn't become ready within the timeout.
    pub async fn spawn_with_engine(engine: FakeEngine) -> Self {
        let temp_media_dir = TempDir::new().expect("Failed to create media dir");

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let cli = CliConfig {
            media_path: Some(temp_media_dir.path().to_path_buf()),
            port,
            metrics_port: 0,
            logging_level: RequestsLoggingLevel::None,
            temp_dir: Some(temp_media_dir.path().join("tmp")),
            max_upload_size: TEST_MAX_UPLOAD_SIZE,
            requester_header: REQUESTER_HEADER.to_string(),
            ..Default::default()
        };
        let config = AppConfig::resolve(&cli, None).expect("Failed to resolve config");

        let engine = Arc::new(engine);
        let state = build_state(&config, engine.clone())
            .await
            .expect("Failed to build state");
        let app = make_app(state);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            engine,
            images_dir: config.media.images_dir.clone(),
            audio_dir: config.media.audio_dir.clone(),
            temp_dir: config.temp_dir.clone(),
            _temp_media_dir: temp_media_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Names of the files currently in `dir`
    pub fn list_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("Failed to read dir")
            .map(|e| e.expect("Bad dir entry").file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
