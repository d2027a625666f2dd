//! Track ingestion: a single uploaded file is read for tags and artwork,
//! stored under the audio root and described back to the client.

mod file_handler;
mod handler;

pub use file_handler::{FileHandler, FileHandlerError};
pub use handler::{IngestionError, IngestionHandler, UploadedFile};
