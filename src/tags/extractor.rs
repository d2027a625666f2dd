//! ID3 tag extraction.
//!
//! Reads the five scalar fields the catalog cares about (artist, title,
//! length, album, genre) plus the first attached picture. A file without a
//! tag block is not an error: every field simply comes back absent and the
//! caller decides what to show instead.

use crate::media::{new_asset_name, ARTWORK_EXTENSION};
use id3::{ErrorKind, Tag, TagLike};
use std::io::Cursor;
use std::path::PathBuf;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Errors that can occur while reading a tag block.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unreadable tag block: {0}")]
    Malformed(#[from] id3::Error),
}

/// Tag fields as found in the file. `None` means the frame was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTags {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub length: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
}

/// Result of parsing a tag block, without any side effects.
#[derive(Debug, Clone, Default)]
pub struct ReadTags {
    pub tags: RawTags,
    pub artwork: Option<Vec<u8>>,
}

/// Result of a full extraction.
#[derive(Debug)]
pub struct Extraction {
    pub tags: RawTags,
    /// Generated artwork file name. Always present, even when the file
    /// carried no picture and nothing was written.
    pub artwork_name: String,
    /// Handle of the background artwork write, if a picture was found.
    pub artwork_write: Option<JoinHandle<()>>,
}

/// Reads tags from raw audio bytes and persists embedded artwork.
#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    images_dir: PathBuf,
}

impl MetadataExtractor {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
        }
    }

    /// Parses the tag block of `bytes`. Performs no I/O.
    pub fn read_tags(bytes: &[u8]) -> Result<ReadTags, ExtractionError> {
        let tag = match Tag::read_from2(Cursor::new(bytes)) {
            Ok(tag) => tag,
            Err(e) if matches!(e.kind, ErrorKind::NoTag) => {
                debug!("No tag block found in {} bytes", bytes.len());
                return Ok(ReadTags::default());
            }
            Err(e) => match e.partial_tag {
                Some(partial) => {
                    warn!("Tag block partially readable, using what was parsed: {}", e.description);
                    partial
                }
                None => return Err(ExtractionError::Malformed(e)),
            },
        };

        let tags = RawTags {
            artist: non_empty(tag.artist()),
            title: non_empty(tag.title()),
            length: non_empty(tag.get("TLEN").and_then(|frame| frame.content().text())),
            album: non_empty(tag.album()),
            genre: non_empty(tag.genre()),
        };
        let artwork = tag.pictures().next().map(|picture| picture.data.clone());

        Ok(ReadTags { tags, artwork })
    }

    /// Parses the tag block and, if a picture is embedded, writes it to
    /// `<images_dir>/<uuid>.png` on a background task.
    ///
    /// A failed artwork write is logged and does not affect the result.
    pub fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractionError> {
        let ReadTags { tags, artwork } = Self::read_tags(bytes)?;
        let artwork_name = new_asset_name(ARTWORK_EXTENSION);

        let artwork_write = artwork.map(|data| {
            let path = self.images_dir.join(&artwork_name);
            tokio::spawn(async move {
                match tokio::fs::write(&path, &data).await {
                    Ok(()) => info!("Artwork saved to {:?} ({} bytes)", path, data.len()),
                    Err(e) => error!("Failed to save artwork to {:?}: {}", path, e),
                }
            })
        });

        Ok(Extraction {
            tags,
            artwork_name,
            artwork_write,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim_matches('\0').trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
