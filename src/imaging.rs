//! Image validation and base64 encoding for the analysis stage.
//!
//! Validation checks the format and the header dimensions first, then
//! decodes the file to prove it is a real image. Encoding ships the original
//! file bytes, not the decoded pixels.

use crate::error::ValidationError;
use crate::gateway::ImagePayload;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{ImageFormat, ImageReader};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::debug;

/// Formats the pipeline accepts.
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

pub const MIN_DIMENSION: u32 = 100;
pub const MAX_DIMENSION: u32 = 4096;

/// What validation learned about an accepted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

/// Check that `path` is a decodable JPEG, PNG, BMP or TIFF whose sides are
/// both within `[MIN_DIMENSION, MAX_DIMENSION]`.
pub fn validate_image(path: &Path) -> Result<ImageInfo, ValidationError> {
    let reader = open_reader(path)?;
    let format = reader
        .format()
        .ok_or_else(|| ValidationError::UnknownFormat(path.to_path_buf()))?;
    if !SUPPORTED_FORMATS.contains(&format) {
        return Err(ValidationError::UnsupportedFormat(format!("{:?}", format)));
    }

    // Header only; oversized files are rejected without a pixel decode.
    let (width, height) = reader.into_dimensions()?;
    let in_range = |side: u32| (MIN_DIMENSION..=MAX_DIMENSION).contains(&side);
    if !in_range(width) || !in_range(height) {
        return Err(ValidationError::Dimensions { width, height });
    }

    open_reader(path)?.decode()?;

    debug!(path = %path.display(), ?format, width, height, "image validated");
    Ok(ImageInfo {
        format,
        width,
        height,
    })
}

fn open_reader(path: &Path) -> Result<ImageReader<BufReader<File>>, ValidationError> {
    let unreadable = |source| ValidationError::Unreadable {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .map_err(unreadable)?
        .with_guessed_format()
        .map_err(unreadable)
}

/// MIME type implied by the file extension. Unknown extensions map to JPEG.
pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("bmp") => "image/bmp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "image/jpeg",
    }
}

/// Read the file and base64-encode its bytes.
pub fn encode_image(path: &Path) -> Result<ImagePayload, ValidationError> {
    let bytes = std::fs::read(path).map_err(|source| ValidationError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ImagePayload {
        data: STANDARD.encode(&bytes),
        mime_type: mime_type_for(path),
    })
}

/// Validate, then encode. Blocking; callers on the runtime should use
/// `spawn_blocking`.
pub fn load_image(path: &Path) -> Result<ImagePayload, ValidationError> {
    validate_image(path)?;
    encode_image(path)
}
