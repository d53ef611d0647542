//! "PREVIEW" watermark stamped on compositor output.
//!
//! Uses a built-in 5x7 bitmap font so the stamp is deterministic and needs
//! no font files at runtime.

use image::{Pixel, Rgba, RgbaImage};

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// Text stamped on every fallback result.
pub(crate) const WATERMARK_TEXT: &str = "PREVIEW";

const BANNER_COLOR: Rgba<u8> = Rgba([0, 0, 0, 150]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 230]);

/// Row bitmaps, most significant of the low 5 bits is the leftmost column.
fn glyph(c: char) -> [u8; 7] {
    match c {
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        _ => [0; 7],
    }
}

/// Pixel scale for the glyphs, proportional to the image width.
pub(crate) fn scale_for(width: u32) -> u32 {
    (width / 160).max(1)
}

/// Stamp a translucent banner with the watermark text at the top-left corner.
///
/// Clips silently when the image is smaller than the banner.
pub(crate) fn stamp_preview(img: &mut RgbaImage) {
    let scale = scale_for(img.width());
    let margin = 2 * scale;
    let advance = (GLYPH_WIDTH + 1) * scale;
    let text_width = advance * WATERMARK_TEXT.len() as u32 - scale;
    let banner_w = text_width + 2 * margin;
    let banner_h = GLYPH_HEIGHT * scale + 2 * margin;

    blend_rect(img, 0, 0, banner_w, banner_h, BANNER_COLOR);

    for (i, c) in WATERMARK_TEXT.chars().enumerate() {
        let origin_x = margin + advance * i as u32;
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    blend_rect(
                        img,
                        origin_x + col * scale,
                        margin + row as u32 * scale,
                        scale,
                        scale,
                        TEXT_COLOR,
                    );
                }
            }
        }
    }
}

fn blend_rect(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    let x_end = (x + w).min(img.width());
    let y_end = (y + h).min(img.height());
    for py in y..y_end {
        for px in x..x_end {
            img.get_pixel_mut(px, py).blend(&color);
        }
    }
}
