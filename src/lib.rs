//! Mixtape Server Library
//!
//! Track ingestion and merging behind an HTTP API. This library exposes the
//! internal modules for testing and potential reuse.

pub mod config;
pub mod ingestion;
pub mod media;
pub mod merge;
pub mod server;
pub mod tags;
pub mod track;

// Re-export commonly used types for convenience
pub use media::{MediaLayout, RequestOrigin};
pub use merge::{AudioEngine, FfmpegEngine, MergeOrchestrator, MergeParams};
pub use server::{build_state, make_app, run_server, RequestsLoggingLevel};
pub use track::TrackMetadata;
