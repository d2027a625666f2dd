//! Single-file ingestion: tag extraction, storage and URL resolution.

use super::file_handler::{FileHandler, FileHandlerError};
use crate::media::{MediaLayout, RequestOrigin};
use crate::server::metrics::record_ingestion;
use crate::tags::{ExtractionError, Extraction, MetadataExtractor};
use crate::track::TrackMetadata;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Metadata extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] FileHandlerError),
}

/// One file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied name. Only used to pick the stored extension.
    pub filename: Option<String>,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: Option<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename,
            data: data.into(),
        }
    }
}

#[derive(Clone)]
pub struct IngestionHandler {
    extractor: MetadataExtractor,
    files: Arc<FileHandler>,
    layout: Arc<MediaLayout>,
}

impl IngestionHandler {
    pub fn new(files: Arc<FileHandler>, layout: Arc<MediaLayout>) -> Self {
        Self {
            extractor: MetadataExtractor::new(layout.images_dir()),
            files,
            layout,
        }
    }

    /// Extracts the upload's tags, stores it under the audio root and
    /// returns its metadata with absolute URLs.
    ///
    /// Extraction happens first, so an unreadable file is never stored. The
    /// image URL is built even when the file carried no artwork.
    pub async fn ingest(
        &self,
        upload: UploadedFile,
        origin: &RequestOrigin,
    ) -> Result<TrackMetadata, IngestionError> {
        if let Err(e) = self.files.check_size(&upload.data) {
            warn!("Rejected upload {:?}: {}", upload.filename, e);
            record_ingestion("storage_failed");
            return Err(e.into());
        }

        let extraction = match self.extractor.extract(&upload.data) {
            Ok(extraction) => extraction,
            Err(e) => {
                error!("Failed to read tags of {:?}: {}", upload.filename, e);
                record_ingestion("extraction_failed");
                return Err(e.into());
            }
        };
        if extraction.artwork_write.is_none() {
            debug!("{:?} carries no artwork", upload.filename);
        }

        let stored_name = match self
            .files
            .store_upload(upload.filename.as_deref(), &upload.data)
            .await
        {
            Ok(name) => name,
            Err(e) => {
                error!("Failed to store upload {:?}: {}", upload.filename, e);
                self.discard_artwork(extraction).await;
                record_ingestion("storage_failed");
                return Err(e.into());
            }
        };

        info!(
            "Ingested {:?} as {} ({} bytes)",
            upload.filename,
            stored_name,
            upload.data.len()
        );
        record_ingestion("ok");

        Ok(TrackMetadata::from_tags(
            extraction.tags,
            None,
            origin.image_url(&self.layout, &extraction.artwork_name),
            origin.audio_url(&self.layout, &stored_name),
        ))
    }

    /// Waits for a pending artwork write and removes the file it produced.
    async fn discard_artwork(&self, extraction: Extraction) {
        let Some(write) = extraction.artwork_write else {
            return;
        };
        if let Err(e) = write.await {
            warn!("Artwork write task failed: {}", e);
        }
        let path = self.layout.image_path(&extraction.artwork_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("Removed artwork {:?} of rejected upload", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artwork {:?}: {}", path, e),
        }
    }
}
