//! Canonical image preprocessing for inference providers.
//!
//! Every user photo is fitted into a fixed 768x1024 envelope (aspect ratio
//! preserved), padded with a neutral background to exactly that size, and
//! re-encoded as JPEG. Providers therefore always see identically shaped
//! input no matter what the user uploaded.
//!
//! All functions here are pure and CPU-bound. Callers on an async runtime
//! should run them via `spawn_blocking`.

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Canonical width handed to providers.
pub const TARGET_WIDTH: u32 = 768;

/// Canonical height handed to providers.
pub const TARGET_HEIGHT: u32 = 1024;

/// JPEG quality used for every canonical re-encode.
pub const JPEG_QUALITY: u8 = 90;

/// Neutral padding colour (light grey).
pub const PAD_COLOR: Rgb<u8> = Rgb([240, 240, 240]);

/// Smallest accepted edge for user photos.
pub const MIN_SOURCE_EDGE: u32 = 256;

/// Garment images are shrunk to fit within this square.
pub const MAX_GARMENT_EDGE: u32 = 1024;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    /// The bytes are not a raster image this build can decode.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(image::ImageError),

    /// The image decoded but is below the minimum size.
    #[error("Image too small ({width}x{height}); minimum edge is {min} px", min = MIN_SOURCE_EDGE)]
    TooSmall { width: u32, height: u32 },

    /// Re-encoding the processed image failed.
    #[error("Failed to encode image: {0}")]
    Encode(image::ImageError),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Normalize a user photo into the canonical 768x1024 JPEG.
pub fn normalize(bytes: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = decode(bytes)?;
    let (width, height) = img.dimensions();
    if width < MIN_SOURCE_EDGE || height < MIN_SOURCE_EDGE {
        return Err(PreprocessError::TooSmall { width, height });
    }

    let canvas = fit_and_pad(&img, TARGET_WIDTH, TARGET_HEIGHT, PAD_COLOR);
    encode_jpeg(&DynamicImage::ImageRgb8(canvas))
}

/// Prepare a downloaded garment image: shrink oversized images to fit
/// within [`MAX_GARMENT_EDGE`] and re-encode as PNG so any alpha channel
/// survives for the compositor.
pub fn prepare_garment(bytes: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let img = decode(bytes)?;
    let (width, height) = img.dimensions();
    let img = if width > MAX_GARMENT_EDGE || height > MAX_GARMENT_EDGE {
        img.resize(MAX_GARMENT_EDGE, MAX_GARMENT_EDGE, FilterType::Lanczos3)
    } else {
        img
    };
    encode_png(&img)
}

/// Decode arbitrary image bytes, mapping failures to `UnsupportedFormat`.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreprocessError> {
    image::load_from_memory(bytes).map_err(PreprocessError::UnsupportedFormat)
}

/// Sniff the MIME type of encoded image bytes from their magic number.
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Png => Some("image/png"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        _ => None,
    }
}

/// Whether the bytes decode into an image.
pub fn is_decodable(bytes: &[u8]) -> bool {
    image::load_from_memory(bytes).is_ok()
}

/// Scale `img` to fit inside `width`x`height` preserving aspect ratio, then
/// center it on a canvas of exactly that size filled with `pad`.
pub fn fit_and_pad(img: &DynamicImage, width: u32, height: u32, pad: Rgb<u8>) -> RgbImage {
    let scaled = img.resize(width, height, FilterType::Lanczos3).to_rgb8();
    let mut canvas = RgbImage::from_pixel(width, height, pad);
    let x = (width - scaled.width()) / 2;
    let y = (height - scaled.height()) / 2;
    image::imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));
    canvas
}

pub(crate) fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Cursor::new(Vec::new());
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY))
        .map_err(PreprocessError::Encode)?;
    Ok(buf.into_inner())
}

pub(crate) fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_with_encoder(PngEncoder::new(&mut buf))
        .map_err(PreprocessError::Encode)?;
    Ok(buf.into_inner())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
