//! Settings for a polish run.

/// Images above this many bytes are recompressed.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 500_000;

/// Longest side, in pixels, of a recompressed image.
pub const DEFAULT_MAX_DIMENSION: u32 = 1200;

/// JPEG quality used for recompressed images.
pub const DEFAULT_JPEG_QUALITY: u8 = 82;

/// Collection every book of the catalog belongs to.
pub const DEFAULT_SERIES: &str = "Narrative History";

/// Configuration for [`Polisher`](crate::Polisher).
#[derive(Debug, Clone)]
pub struct PolishConfig {
    /// Stylesheet written over the book's own. `None` uses the built-in one.
    pub stylesheet: Option<String>,
    /// Series declared in the metadata when the book declares none.
    /// `None` leaves the metadata alone.
    pub series: Option<String>,
    /// Position of the book within the series.
    pub series_position: Option<u32>,
    /// Size threshold for image recompression, in bytes.
    pub max_image_bytes: usize,
    /// Longest side of a recompressed image. Smaller images are never upscaled.
    pub max_dimension: u32,
    /// JPEG quality (1-100) of recompressed images.
    pub jpeg_quality: u8,
}

impl Default for PolishConfig {
    fn default() -> Self {
        Self {
            stylesheet: None,
            series: Some(DEFAULT_SERIES.to_string()),
            series_position: None,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}
