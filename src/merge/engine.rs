//! Audio engine that renders a filter graph into an output file.
//!
//! The production engine shells out to `ffmpeg`. Jobs run as child
//! processes awaited on the tokio runtime, bounded by a semaphore and a
//! per-job deadline.

use super::graph::FilterGraph;
use crate::server::metrics::{engine_job_finished, engine_job_started};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// How many trailing stderr lines to keep when ffmpeg fails.
const STDERR_TAIL_LINES: usize = 12;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start engine: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Engine exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("Engine timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Engine reported success but wrote nothing to {0:?}")]
    MissingOutput(PathBuf),

    #[error("Engine worker pool is closed")]
    PoolClosed,
}

/// Everything the engine needs to render one merge.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub inputs: [PathBuf; 2],
    pub graph: FilterGraph,
    pub output: PathBuf,
}

#[async_trait]
pub trait AudioEngine: Send + Sync {
    /// Renders `job`, resolving once the output file is complete or the
    /// engine has failed.
    async fn render(&self, job: &RenderJob) -> Result<(), EngineError>;
}

/// Renders jobs with the system `ffmpeg` binary.
pub struct FfmpegEngine {
    binary: PathBuf,
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<PathBuf>, max_concurrent_jobs: usize, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            permits: Arc::new(Semaphore::new(max_concurrent_jobs.max(1))),
            timeout,
        }
    }

    /// Checks that the configured binary can be executed.
    pub async fn check_available(&self) -> Result<(), EngineError> {
        let status = Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;

        if !status.success() {
            return Err(EngineError::Failed {
                status: status.to_string(),
                stderr: format!("{:?} -version failed", self.binary),
            });
        }
        Ok(())
    }
}

/// Command-line arguments for rendering `job`.
pub fn ffmpeg_args(job: &RenderJob) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];
    for input in &job.inputs {
        args.push("-i".into());
        args.push(input.clone().into_os_string());
    }
    args.push("-filter_complex".into());
    args.push(job.graph.to_filter_complex().into());
    args.push(job.output.clone().into_os_string());
    args
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[async_trait]
impl AudioEngine for FfmpegEngine {
    async fn render(&self, job: &RenderJob) -> Result<(), EngineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EngineError::PoolClosed)?;

        debug!("Running {:?} with graph {}", self.binary, job.graph);

        let mut command = Command::new(&self.binary);
        command
            .args(ffmpeg_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        engine_job_started();
        let result = tokio::time::timeout(self.timeout, command.output()).await;
        engine_job_finished();

        let output = match result {
            Ok(output) => output?,
            Err(_) => {
                warn!("ffmpeg exceeded {:?} rendering {:?}", self.timeout, job.output);
                return Err(EngineError::TimedOut(self.timeout));
            }
        };

        if !output.status.success() {
            return Err(EngineError::Failed {
                status: output.status.to_string(),
                stderr: stderr_tail(&output.stderr),
            });
        }

        match tokio::fs::metadata(&job.output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(EngineError::MissingOutput(job.output.clone())),
        }
    }
}
