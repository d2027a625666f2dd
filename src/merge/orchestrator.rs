//! Merge orchestration.
//!
//! A merge moves through
//! `Received -> InputsResolved -> GraphSubmitted -> EngineRunning`
//! and ends in either `Completed` or `EngineFailed`. The whole run happens
//! on its own tokio task: the caller awaits the task, and a caller that goes
//! away does not cancel a job that was already handed to the engine.

use super::engine::{AudioEngine, EngineError, RenderJob};
use super::graph::{FilterGraph, MergeParams, ValidationError};
use crate::media::{new_asset_name, MediaLayout, RequestOrigin, MERGED_AUDIO_EXTENSION};
use crate::server::metrics::record_merge;
use crate::tags::{ExtractionError, MetadataExtractor, ReadTags};
use crate::track::TrackMetadata;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("Invalid merge parameters: {0}")]
    Validation(#[from] ValidationError),

    #[error("Audio engine failed: {0}")]
    EngineFailed(#[source] EngineError),

    #[error("Could not read merged output: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Merge task aborted: {0}")]
    Aborted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    Received,
    InputsResolved,
    GraphSubmitted,
    EngineRunning,
    Completed,
    EngineFailed,
}

impl MergeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MergeState::Completed | MergeState::EngineFailed)
    }

    pub fn can_advance_to(&self, next: MergeState) -> bool {
        use MergeState::*;
        matches!(
            (self, next),
            (Received, InputsResolved)
                | (InputsResolved, GraphSubmitted)
                | (GraphSubmitted, EngineRunning)
                | (EngineRunning, Completed)
                | (EngineRunning, EngineFailed)
        )
    }
}

impl fmt::Display for MergeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A merge of one or two uploaded inputs.
#[derive(Debug)]
pub struct MergeRequest {
    pub input_a: PathBuf,
    /// When absent, `input_a` is merged with itself.
    pub input_b: Option<PathBuf>,
    pub params: MergeParams,
    /// Display name of the requesting user, used when the output has no
    /// artist tag.
    pub requester: Option<String>,
    /// Scratch directory holding the uploaded inputs. Removed when the
    /// request is dropped, after the merge reaches a terminal state.
    pub scratch: Option<TempDir>,
}

impl MergeRequest {
    pub fn new(input_a: impl Into<PathBuf>, input_b: Option<PathBuf>, params: MergeParams) -> Self {
        Self {
            input_a: input_a.into(),
            input_b,
            params,
            requester: None,
            scratch: None,
        }
    }

    pub fn with_requester(mut self, requester: Option<String>) -> Self {
        self.requester = requester;
        self
    }

    pub fn with_scratch(mut self, scratch: TempDir) -> Self {
        self.scratch = Some(scratch);
        self
    }

    /// The two engine inputs. A single upload is duplicated.
    pub fn resolve_inputs(&self) -> [PathBuf; 2] {
        let second = self.input_b.clone().unwrap_or_else(|| self.input_a.clone());
        [self.input_a.clone(), second]
    }
}

/// Tracks the state of one merge and logs every transition.
struct MergeJob {
    id: String,
    state: MergeState,
}

impl MergeJob {
    fn new(id: &str) -> Self {
        debug!("merge {}: {}", id, MergeState::Received);
        Self {
            id: id.to_string(),
            state: MergeState::Received,
        }
    }

    fn advance(&mut self, next: MergeState) {
        if !self.state.can_advance_to(next) {
            warn!(
                "merge {}: unexpected transition {} -> {}",
                self.id, self.state, next
            );
        }
        debug!("merge {}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }
}

#[derive(Clone)]
pub struct MergeOrchestrator {
    engine: Arc<dyn AudioEngine>,
    layout: Arc<MediaLayout>,
    placeholder_cover_url: String,
}

impl MergeOrchestrator {
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        layout: Arc<MediaLayout>,
        placeholder_cover_url: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            layout,
            placeholder_cover_url: placeholder_cover_url.into(),
        }
    }

    /// Runs a merge to completion and returns the output's metadata.
    pub async fn merge(
        &self,
        request: MergeRequest,
        origin: &RequestOrigin,
    ) -> Result<TrackMetadata, MergeError> {
        let this = self.clone();
        let origin = origin.clone();
        tokio::spawn(async move { this.run(request, origin).await })
            .await
            .map_err(|e| MergeError::Aborted(e.to_string()))?
    }

    async fn run(
        &self,
        request: MergeRequest,
        origin: RequestOrigin,
    ) -> Result<TrackMetadata, MergeError> {
        let started = Instant::now();
        let output_name = new_asset_name(MERGED_AUDIO_EXTENSION);
        let mut job = MergeJob::new(&output_name);

        let inputs = request.resolve_inputs();
        if request.input_b.is_none() {
            debug!("merge {}: single input, merging {:?} with itself", job.id, inputs[0]);
        }
        job.advance(MergeState::InputsResolved);

        let graph = match FilterGraph::build(request.params) {
            Ok(graph) => graph,
            Err(e) => {
                warn!("merge {}: rejected parameters: {}", job.id, e);
                record_merge("invalid", started.elapsed());
                return Err(e.into());
            }
        };
        let output = self.layout.audio_path(&output_name);
        let render_job = RenderJob {
            inputs,
            graph,
            output: output.clone(),
        };
        job.advance(MergeState::GraphSubmitted);

        job.advance(MergeState::EngineRunning);
        if let Err(e) = self.engine.render(&render_job).await {
            job.advance(MergeState::EngineFailed);
            error!("merge {}: engine failed: {}", job.id, e);
            discard_partial_output(&output).await;
            record_merge("engine_failed", started.elapsed());
            return Err(MergeError::EngineFailed(e));
        }

        let (read, size) = match read_output(&output).await {
            Ok(result) => result,
            Err(e) => {
                job.advance(MergeState::EngineFailed);
                error!("merge {}: unreadable output: {}", job.id, e);
                discard_partial_output(&output).await;
                record_merge("readback_failed", started.elapsed());
                return Err(e);
            }
        };
        job.advance(MergeState::Completed);

        info!(
            "merge {}: completed in {}ms ({} bytes)",
            job.id,
            started.elapsed().as_millis(),
            size
        );
        record_merge("completed", started.elapsed());

        Ok(TrackMetadata::from_tags(
            read.tags,
            request.requester.as_deref(),
            self.placeholder_cover_url.clone(),
            origin.audio_url(&self.layout, &output_name),
        ))
    }
}

/// Reads the tags of a finished output, along with its size in bytes.
async fn read_output(path: &Path) -> Result<(ReadTags, usize), MergeError> {
    let bytes = tokio::fs::read(path).await?;
    let read = MetadataExtractor::read_tags(&bytes)?;
    Ok((read, bytes.len()))
}

async fn discard_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}
