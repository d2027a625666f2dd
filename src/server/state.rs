use axum::extract::FromRef;

use crate::ingestion::{FileHandler, IngestionHandler};
use crate::media::MediaLayout;
use crate::merge::MergeOrchestrator;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedMediaLayout = Arc<MediaLayout>;
pub type GuardedFileHandler = Arc<FileHandler>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub layout: GuardedMediaLayout,
    pub file_handler: GuardedFileHandler,
    pub ingestion: IngestionHandler,
    pub merger: MergeOrchestrator,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedMediaLayout {
    fn from_ref(input: &ServerState) -> Self {
        input.layout.clone()
    }
}

impl FromRef<ServerState> for GuardedFileHandler {
    fn from_ref(input: &ServerState) -> Self {
        input.file_handler.clone()
    }
}

impl FromRef<ServerState> for IngestionHandler {
    fn from_ref(input: &ServerState) -> Self {
        input.ingestion.clone()
    }
}

impl FromRef<ServerState> for MergeOrchestrator {
    fn from_ref(input: &ServerState) -> Self {
        input.merger.clone()
    }
}
