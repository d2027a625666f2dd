//! Embedded tag and artwork extraction for uploaded audio files.

mod extractor;

pub use extractor::{ExtractionError, Extraction, MetadataExtractor, RawTags, ReadTags};
