//! Metadata extraction for recovered images and documents
//!
//! Images are read for EXIF tags, PDFs for their document information
//! dictionary. Both produce a flat, ordered `key -> value` map so the report
//! and the database can treat them the same way.

use std::path::Path;

use thiserror::Error;

pub mod exif;
pub mod pdf;

use crate::recovery::signatures::FileSignature;
use crate::{FileKind, MetadataMap};

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("EXIF error: {0}")]
    Exif(#[from] ::exif::Error),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Formats whose containers can never carry EXIF
const NO_EXIF_MIME_TYPES: [&str; 2] = ["image/gif", "image/bmp"];

/// Extract whatever metadata the file's type supports
pub fn extract_metadata(
    path: &Path,
    signature: Option<&FileSignature>,
) -> Result<MetadataMap, MetadataError> {
    let Some(signature) = signature else {
        return Ok(MetadataMap::new());
    };

    match signature.kind {
        FileKind::Image if NO_EXIF_MIME_TYPES.contains(&signature.mime_type.as_str()) => {
            Ok(MetadataMap::new())
        }
        FileKind::Image => exif::read_exif(path),
        FileKind::Pdf => pdf::read_document_info(path),
        FileKind::Other => Ok(MetadataMap::new()),
    }
}
