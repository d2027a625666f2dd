//! On-disk layout of generated media and the URLs that point at it.

use std::path::{Path, PathBuf};

/// Extension used for extracted artwork files.
pub const ARTWORK_EXTENSION: &str = "png";

/// Extension used for merged audio files.
pub const MERGED_AUDIO_EXTENSION: &str = "mp3";

/// Where artwork and audio assets live on disk, and the URL path prefixes
/// they are served under.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    images_dir: PathBuf,
    audio_dir: PathBuf,
    image_url_prefix: String,
    audio_url_prefix: String,
}

impl MediaLayout {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        audio_dir: impl Into<PathBuf>,
        image_url_prefix: &str,
        audio_url_prefix: &str,
    ) -> Self {
        Self {
            images_dir: images_dir.into(),
            audio_dir: audio_dir.into(),
            image_url_prefix: normalize_prefix(image_url_prefix),
            audio_url_prefix: normalize_prefix(audio_url_prefix),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn image_url_prefix(&self) -> &str {
        &self.image_url_prefix
    }

    pub fn audio_url_prefix(&self) -> &str {
        &self.audio_url_prefix
    }

    pub fn image_path(&self, filename: &str) -> PathBuf {
        self.images_dir.join(filename)
    }

    pub fn audio_path(&self, filename: &str) -> PathBuf {
        self.audio_dir.join(filename)
    }

    /// Creates the image and audio directories if missing.
    pub async fn init(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.images_dir).await?;
        tokio::fs::create_dir_all(&self.audio_dir).await?;
        Ok(())
    }
}

/// Scheme and host a request arrived on, used to build absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
        }
    }

    /// `<scheme>://<host><prefix>/<filename>`
    pub fn url_for(&self, prefix: &str, filename: &str) -> String {
        format!("{}://{}{}/{}", self.scheme, self.host, prefix, filename)
    }

    pub fn image_url(&self, layout: &MediaLayout, filename: &str) -> String {
        self.url_for(layout.image_url_prefix(), filename)
    }

    pub fn audio_url(&self, layout: &MediaLayout, filename: &str) -> String {
        self.url_for(layout.audio_url_prefix(), filename)
    }
}

/// Generates a fresh `<uuid>.<extension>` asset name.
pub fn new_asset_name(extension: &str) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), extension)
}

/// Leading slash, no trailing slash. An empty prefix stays empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
