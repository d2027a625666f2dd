//! Two-track merging: filter graph construction, the audio engine that
//! renders it, and the orchestrator that drives a merge to completion.

pub mod engine;
pub mod graph;
mod orchestrator;

pub use engine::{AudioEngine, EngineError, FfmpegEngine, RenderJob};
pub use graph::{FilterGraph, MergeParams, ValidationError};
pub use orchestrator::{MergeError, MergeOrchestrator, MergeRequest, MergeState};
