//! Cover image validation and transcoding.
//!
//! Every embedded cover must decode as a raster image, and is stored as
//! JPEG. Anything else (PNG, GIF, WebP...) is re-encoded.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::enrichment::domain::EnrichmentError;
use crate::model::CoverAsset;

/// Canonical MIME type of embedded covers
pub const TARGET_MIME: &str = "image/jpeg";

/// Validate raw image bytes and turn them into a JPEG [`CoverAsset`].
pub fn normalize(data: Vec<u8>, source_mime_type: &str) -> Result<CoverAsset, EnrichmentError> {
    let format =
        image::guess_format(&data).map_err(|e| EnrichmentError::Decode(e.to_string()))?;
    let decoded = image::load_from_memory_with_format(&data, format)
        .map_err(|e| EnrichmentError::Decode(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());

    if format == ImageFormat::Jpeg {
        let depth = decoded.color().bits_per_pixel().min(u8::MAX as u16) as u8;
        return Ok(CoverAsset {
            data,
            mime_type: TARGET_MIME.to_string(),
            source_mime_type: source_mime_type.to_string(),
            width,
            height,
            depth,
        });
    }

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
    let mut out = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
        .map_err(|e| EnrichmentError::Decode(e.to_string()))?;

    tracing::debug!(
        from = ?format,
        width,
        height,
        "Transcoded cover to JPEG"
    );

    Ok(CoverAsset {
        data: out,
        mime_type: TARGET_MIME.to_string(),
        source_mime_type: source_mime_type.to_string(),
        width,
        height,
        depth: 24,
    })
}
