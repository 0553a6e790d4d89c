//! Print-ready size variants
//!
//! Fixed table of shop print formats, all at 300 DPI. Artwork is inside-fit
//! without enlargement; a format that fails to encode is skipped rather than
//! failing the whole set.

use bytes::Bytes;
use image::{imageops, DynamicImage, GenericImageView};
use tracing::warn;

use super::encode;

/// Shop print formats at 300 DPI: (name, width px, height px)
pub const PRINT_FORMATS: [(&str, u32, u32); 5] = [
    ("4x5", 2400, 3000),   // 8x10"
    ("3x4", 5400, 7200),   // 18x24"
    ("2x3", 3600, 5400),   // 12x18"
    ("11x14", 3300, 4200), // 11x14"
    ("A4", 2480, 3508),
];

/// A single print-file variant
pub struct PrintVariant {
    pub format: &'static str,
    pub width: u32,
    pub height: u32,
    pub bytes: Bytes,
}

/// Resize artwork into every print format.
///
/// Inside-fit, never enlarged past the source resolution, JPEG at the given
/// quality with 300 DPI density.
pub fn resize_to_formats(artwork: &DynamicImage, quality: u8) -> Vec<PrintVariant> {
    let mut variants = Vec::with_capacity(PRINT_FORMATS.len());

    for (format, width, height) in PRINT_FORMATS {
        // inside fit, no enlargement
        let target_w = width.min(artwork.width().max(1));
        let target_h = height.min(artwork.height().max(1));
        let resized = artwork.resize(target_w, target_h, imageops::FilterType::Lanczos3);

        match encode::encode_print_jpeg(&resized, quality) {
            Ok(bytes) => variants.push(PrintVariant {
                format,
                width: resized.width(),
                height: resized.height(),
                bytes: Bytes::from(bytes),
            }),
            Err(e) => {
                warn!(format = %format, error = %e, "Failed to encode print variant");
            }
        }
    }

    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn artwork(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([90, 120, 40, 255])))
    }

    #[test]
    fn produces_all_formats() {
        let variants = resize_to_formats(&artwork(6000, 8000), 95);
        assert_eq!(variants.len(), PRINT_FORMATS.len());
        for variant in &variants {
            let (units, x, _) = encode::read_dpi(&variant.bytes).unwrap();
            assert_eq!((units, x), (1, 300));
        }
    }

    #[test]
    fn never_enlarges_small_artwork() {
        let variants = resize_to_formats(&artwork(600, 800), 95);
        for variant in &variants {
            assert!(
                variant.width <= 600 && variant.height <= 800,
                "{} enlarged to {}x{}",
                variant.format,
                variant.width,
                variant.height
            );
        }
    }

    #[test]
    fn fits_inside_format_box() {
        let variants = resize_to_formats(&artwork(6000, 8000), 95);
        for (variant, (_, fw, fh)) in variants.iter().zip(PRINT_FORMATS) {
            assert!(variant.width <= fw && variant.height <= fh);
        }
    }
}
