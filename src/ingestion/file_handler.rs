//! File handling for uploaded audio.

use crate::media::new_asset_name;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Errors that can occur during file handling.
#[derive(Debug, Error)]
pub enum FileHandlerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File too large: {0} bytes (max: {1})")]
    FileTooLarge(u64, u64),
}

/// Supported audio file extensions.
const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac", "wma", "opus"];

/// Extension used when the client name carries no supported one.
const FALLBACK_EXTENSION: &str = "mp3";

/// Stores uploads in the audio root and stages merge inputs in scratch
/// directories under the temp root.
#[derive(Debug)]
pub struct FileHandler {
    /// Base directory for per-request scratch directories.
    temp_dir: PathBuf,
    /// Where ingested uploads are kept.
    audio_dir: PathBuf,
    /// Maximum file size in bytes.
    max_file_size: u64,
}

impl FileHandler {
    pub fn new(temp_dir: impl Into<PathBuf>, audio_dir: impl Into<PathBuf>, max_file_size: u64) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            audio_dir: audio_dir.into(),
            max_file_size,
        }
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Creates the temp and audio directories.
    pub async fn init(&self) -> Result<(), FileHandlerError> {
        fs::create_dir_all(&self.temp_dir).await?;
        fs::create_dir_all(&self.audio_dir).await?;
        Ok(())
    }

    /// Rejects payloads above the configured maximum.
    pub fn check_size(&self, data: &[u8]) -> Result<(), FileHandlerError> {
        let size = data.len() as u64;
        if size > self.max_file_size {
            return Err(FileHandlerError::FileTooLarge(size, self.max_file_size));
        }
        Ok(())
    }

    /// Writes an upload to the audio root as `<uuid>.<ext>` and returns the
    /// stored name. The client's filename only contributes its extension.
    pub async fn store_upload(
        &self,
        filename: Option<&str>,
        data: &[u8],
    ) -> Result<String, FileHandlerError> {
        self.check_size(data)?;

        let extension = filename
            .and_then(audio_extension)
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());
        let stored_name = new_asset_name(&extension);

        write_file(&self.audio_dir.join(&stored_name), data).await?;
        Ok(stored_name)
    }

    /// Creates a scratch directory for one request. It is deleted when the
    /// returned handle is dropped.
    pub fn create_scratch(&self) -> Result<TempDir, FileHandlerError> {
        let scratch = tempfile::Builder::new()
            .prefix("merge-")
            .tempdir_in(&self.temp_dir)?;
        Ok(scratch)
    }

    /// Saves the `index`-th upload of a request into `scratch`.
    pub async fn save_to_scratch(
        &self,
        scratch: &Path,
        index: usize,
        filename: Option<&str>,
        data: &[u8],
    ) -> Result<PathBuf, FileHandlerError> {
        self.check_size(data)?;

        let safe_filename = match filename {
            Some(name) => sanitize_filename(name)?,
            None => format!("upload.{}", FALLBACK_EXTENSION),
        };
        // Prefixed so two uploads with the same name do not collide.
        let file_path = scratch.join(format!("{}-{}", index, safe_filename));
        write_file(&file_path, data).await?;
        Ok(file_path)
    }

    /// Check if a file is a supported audio format.
    pub fn is_supported_audio(filename: &str) -> bool {
        audio_extension(filename).is_some()
    }
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), FileHandlerError> {
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.flush().await?;
    Ok(())
}

/// Lowercased extension of `filename` if it is a supported audio format.
fn audio_extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Sanitize a filename to prevent path traversal attacks.
fn sanitize_filename(filename: &str) -> Result<String, FileHandlerError> {
    // Get just the filename part (no path)
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FileHandlerError::InvalidFilename(filename.to_string()))?;

    // Null bytes, hidden files and bare ".." are rejected. "..." inside a
    // name is fine.
    if name.contains('\0') || name.starts_with('.') || name == ".." {
        return Err(FileHandlerError::InvalidFilename(filename.to_string()));
    }

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect();

    if sanitized.is_empty() {
        return Err(FileHandlerError::InvalidFilename(filename.to_string()));
    }

    Ok(sanitized)
}
