//! Track upload and merge routes.

use super::request_context::Requester;
use super::state::ServerState;
use crate::ingestion::{FileHandlerError, IngestionError, IngestionHandler, UploadedFile};
use crate::media::RequestOrigin;
use crate::merge::{MergeError, MergeParams, MergeRequest};
use crate::track::TrackMetadata;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::{debug, error, warn};

pub const UPLOAD_FILE_FIELD: &str = "file";
pub const MERGE_FILES_FIELD: &str = "files";
pub const FADE_IN_FIELD: &str = "fadeinDuration";
pub const PITCH_FIELD: &str = "pitch";
pub const SPEED_FIELD: &str = "speed";
pub const VOLUME_FIELD: &str = "volume";

const MERGE_PARAM_FIELDS: [&str; 4] = [FADE_IN_FIELD, PITCH_FIELD, SPEED_FIELD, VOLUME_FIELD];
const MAX_MERGE_INPUTS: usize = 2;

const UPLOAD_SUCCESS_MESSAGE: &str = "Track uploaded successfully";
const UPLOAD_FAILED_MESSAGE: &str = "Error uploading track";
const MERGE_SUCCESS_MESSAGE: &str = "Tracks merged successfully";
const MERGE_FAILED_MESSAGE: &str = "Error merging tracks";

/// Room for multipart framing and text fields on top of the file payloads.
const MULTIPART_OVERHEAD: u64 = 64 * 1024;

#[derive(Serialize)]
struct TrackResponse {
    message: &'static str,
    data: TrackMetadata,
}

#[derive(Serialize)]
struct MessageResponse {
    message: String,
}

fn message(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(MessageResponse {
            message: message.into(),
        }),
    )
        .into_response()
}

fn multipart_error(e: MultipartError) -> Response {
    warn!("Failed to read multipart body: {}", e);
    message(e.status(), e.body_text())
}

/// POST /upload - Ingest a single track (multipart field `file`)
async fn upload_track(
    State(ingestion): State<IngestionHandler>,
    origin: RequestOrigin,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<UploadedFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e),
        };

        // Only the first file is ingested.
        if field.name() != Some(UPLOAD_FILE_FIELD) || upload.is_some() {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string());
        match field.bytes().await {
            Ok(bytes) => upload = Some(UploadedFile::new(filename, bytes.to_vec())),
            Err(e) => return multipart_error(e),
        }
    }

    let Some(upload) = upload else {
        return message(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    match ingestion.ingest(upload, &origin).await {
        Ok(track) => (
            StatusCode::CREATED,
            Json(TrackResponse {
                message: UPLOAD_SUCCESS_MESSAGE,
                data: track,
            }),
        )
            .into_response(),
        Err(IngestionError::Storage(FileHandlerError::FileTooLarge(size, max))) => {
            warn!("Rejected upload of {} bytes (max {})", size, max);
            message(StatusCode::PAYLOAD_TOO_LARGE, "File too large")
        }
        Err(e) => {
            error!("Upload failed: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILED_MESSAGE)
        }
    }
}

/// POST /merge - Merge one or two tracks (multipart fields `files`,
/// `fadeinDuration`, `pitch`, `speed`, `volume`)
async fn merge_tracks(
    State(state): State<ServerState>,
    origin: RequestOrigin,
    Requester(requester): Requester,
    mut multipart: Multipart,
) -> Response {
    let mut scratch: Option<TempDir> = None;
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut values: HashMap<&'static str, String> = HashMap::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_error(e),
        };
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == MERGE_FILES_FIELD {
            if inputs.len() == MAX_MERGE_INPUTS {
                return message(StatusCode::BAD_REQUEST, "At most two files can be merged");
            }
            let filename = field.file_name().map(|s| s.to_string());
            let data = match field.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => return multipart_error(e),
            };

            let dir = match scratch.take() {
                Some(dir) => dir,
                None => match state.file_handler.create_scratch() {
                    Ok(dir) => dir,
                    Err(e) => {
                        error!("Failed to create scratch directory: {}", e);
                        return message(StatusCode::INTERNAL_SERVER_ERROR, MERGE_FAILED_MESSAGE);
                    }
                },
            };
            let saved = state
                .file_handler
                .save_to_scratch(dir.path(), inputs.len(), filename.as_deref(), &data)
                .await;
            scratch = Some(dir);

            match saved {
                Ok(path) => inputs.push(path),
                Err(FileHandlerError::FileTooLarge(..)) => {
                    return message(StatusCode::PAYLOAD_TOO_LARGE, "File too large");
                }
                Err(FileHandlerError::InvalidFilename(name)) => {
                    return message(
                        StatusCode::BAD_REQUEST,
                        format!("Invalid filename: {}", name),
                    );
                }
                Err(e) => {
                    error!("Failed to save merge input: {}", e);
                    return message(StatusCode::INTERNAL_SERVER_ERROR, MERGE_FAILED_MESSAGE);
                }
            }
        } else if let Some(param) = MERGE_PARAM_FIELDS.iter().find(|p| **p == field_name) {
            let text = match field.text().await {
                Ok(text) => text,
                Err(e) => return multipart_error(e),
            };
            // Repeated values: the first one wins.
            if values.contains_key(param) {
                debug!("Ignoring repeated value for {}", param);
            } else {
                values.insert(*param, text);
            }
        }
    }

    let (Some(scratch), Some(first)) = (scratch, inputs.first().cloned()) else {
        return message(StatusCode::BAD_REQUEST, "No files uploaded");
    };

    let value = |name: &str| values.get(name).map(String::as_str);
    let params = match MergeParams::from_form_values(
        value(FADE_IN_FIELD),
        value(PITCH_FIELD),
        value(SPEED_FIELD),
        value(VOLUME_FIELD),
    )
    .and_then(|params| params.validate().map(|_| params))
    {
        Ok(params) => params,
        Err(e) => return message(StatusCode::BAD_REQUEST, e.to_string()),
    };

    let request = MergeRequest::new(first, inputs.get(1).cloned(), params)
        .with_requester(requester)
        .with_scratch(scratch);

    match state.merger.merge(request, &origin).await {
        Ok(track) => (
            StatusCode::OK,
            Json(TrackResponse {
                message: MERGE_SUCCESS_MESSAGE,
                data: track,
            }),
        )
            .into_response(),
        Err(MergeError::Validation(e)) => message(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => {
            error!("Merge failed: {}", e);
            message(StatusCode::INTERNAL_SERVER_ERROR, MERGE_FAILED_MESSAGE)
        }
    }
}

pub fn make_track_routes(state: ServerState) -> Router {
    let body_limit = state
        .config
        .max_upload_size
        .saturating_mul(MAX_MERGE_INPUTS as u64)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/upload", post(upload_track))
        .route("/merge", post(merge_tracks))
        .layer(DefaultBodyLimit::max(
            usize::try_from(body_limit).unwrap_or(usize::MAX),
        ))
        .with_state(state)
}
