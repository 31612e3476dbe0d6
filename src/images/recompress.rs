//! JPEG re-encoding of oversized images.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ImageError, ImageFormat};

use crate::archive::Archive;

/// Raster formats eligible for recompression.
pub fn is_recompressible(data: &[u8]) -> bool {
    matches!(
        image::guess_format(data),
        Ok(ImageFormat::Png | ImageFormat::Jpeg)
    )
}

/// True when the bytes are a PNG.
pub fn is_png(data: &[u8]) -> bool {
    matches!(image::guess_format(data), Ok(ImageFormat::Png))
}

/// PNG and JPEG entries larger than `max_bytes`, in archive order.
pub fn oversized(archive: &Archive, max_bytes: usize) -> Vec<String> {
    archive
        .entries()
        .iter()
        .filter(|e| e.data.len() > max_bytes && is_recompressible(&e.data))
        .map(|e| e.name.clone())
        .collect()
}

/// Decode, fit within `max_dimension` on the longest side and re-encode as JPEG.
///
/// Images already within bounds keep their size; nothing is upscaled.
/// Transparency is flattened.
pub fn recompress(data: &[u8], max_dimension: u32, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut img = image::load_from_memory(data)?;
    if img.width() > max_dimension || img.height() > max_dimension {
        img = img.resize(max_dimension, max_dimension, FilterType::Lanczos3);
    }
    let rgb = img.to_rgb8();

    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(&rgb)?;
    Ok(buffer)
}
