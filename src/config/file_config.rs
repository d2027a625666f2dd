use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub media_path: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub temp_dir: Option<String>,
    pub max_upload_size: Option<u64>,
    pub requester_header: Option<String>,

    // Feature configs
    pub media: Option<MediaConfig>,
    pub engine: Option<EngineConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct MediaConfig {
    /// Subdirectory of `media_path` holding extracted artwork.
    pub images_dir: Option<String>,
    /// Subdirectory of `media_path` holding uploaded and merged audio.
    pub audio_dir: Option<String>,
    pub image_url_prefix: Option<String>,
    pub audio_url_prefix: Option<String>,
    pub placeholder_cover_url: Option<String>,
    /// Host used in generated URLs when a request carries no Host header.
    pub public_host: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub ffmpeg_path: Option<String>,
    pub max_concurrent_jobs: Option<usize>,
    pub job_timeout_sec: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
