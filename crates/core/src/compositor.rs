//! Local fallback compositor.
//!
//! Used when every remote try-on provider has failed. Scales the garment to
//! a fixed fraction of the person's width, alpha-composites it centered at a
//! fixed vertical offset, stamps a "PREVIEW" watermark and re-encodes as
//! JPEG. The algorithm is deterministic: the same inputs always give the
//! same bytes.
//!
//! [`composite`] never fails. If the overlay itself cannot be produced the
//! unmodified person image is handed back as [`Composite::Passthrough`].

use image::imageops::FilterType;
use image::DynamicImage;

use crate::preprocess::{self, PreprocessError};
use crate::watermark;

/// Garment width as a fraction of the person image width.
pub const GARMENT_WIDTH_RATIO: f32 = 0.40;

/// Vertical placement of the garment's top edge, as a fraction of height.
pub const GARMENT_TOP_RATIO: f32 = 0.25;

/// Outcome of a compositor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composite {
    /// Watermarked overlay (JPEG).
    Overlay(Vec<u8>),
    /// Composition failed; the person image is returned unchanged.
    Passthrough { image: Vec<u8>, reason: String },
}

/// Overlay `garment` onto `person`, degrading to the person image on error.
pub fn composite(person: &[u8], garment: &[u8]) -> Composite {
    match try_composite(person, garment) {
        Ok(bytes) => Composite::Overlay(bytes),
        Err(e) => Composite::Passthrough {
            image: person.to_vec(),
            reason: e.to_string(),
        },
    }
}

/// Overlay `garment` onto `person`, surfacing decode/encode failures.
pub fn try_composite(person: &[u8], garment: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    let mut base = preprocess::decode(person)?.to_rgba8();
    let garment = preprocess::decode(garment)?.to_rgba8();

    let (person_w, person_h) = base.dimensions();
    let target_w = ((person_w as f32 * GARMENT_WIDTH_RATIO).round() as u32).max(1);
    let target_h = ((garment.height() as f32 * target_w as f32 / garment.width() as f32).round()
        as u32)
        .max(1);
    let scaled = image::imageops::resize(&garment, target_w, target_h, FilterType::Triangle);

    let x = i64::from(person_w.saturating_sub(target_w) / 2);
    let y = (person_h as f32 * GARMENT_TOP_RATIO).round() as i64;
    image::imageops::overlay(&mut base, &scaled, x, y);

    watermark::stamp_preview(&mut base);

    preprocess::encode_jpeg(&DynamicImage::ImageRgba8(base))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
