//! Image encoding for the recognisers.
//!
//! Rendered pages are stored as PNG: lossless compression keeps glyph edges
//! sharp, which both Tesseract and vision models depend on. Vision providers
//! additionally need the bytes as base64 inside the request body.

use crate::engine::EncodedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<EncodedImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(EncodedImage::png(buf))
}

/// Wrap an encoded image for a vision-model request.
///
/// `detail: "high"` keeps providers from downsampling to a single overview
/// tile, which loses small print.
pub fn to_image_data(image: &EncodedImage) -> ImageData {
    let b64 = STANDARD.encode(&image.bytes);
    ImageData::new(b64, image.media_type.clone()).with_detail("high")
}
