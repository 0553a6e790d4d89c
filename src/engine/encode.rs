//! Raster decode/encode helpers
//!
//! Output is always JPEG with explicit density metadata: print shops reject
//! files without a real DPI, so every composite is stamped at 300 DPI no
//! matter what the inputs carried.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, Rgba, RgbaImage};
use tracing::debug;

/// Density stamped on every output raster
pub const PRINT_DPI: u16 = 300;

/// Decode artwork bytes into a raster.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    image::load_from_memory(bytes)
}

/// Encode a raster to JPEG at the given quality with `PRINT_DPI` density.
pub fn encode_print_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)?;
    stamp_dpi(&mut buffer, PRINT_DPI);
    Ok(buffer)
}

/// Set the JFIF density fields of an encoded JPEG to `dpi` dots-per-inch.
///
/// Patches the APP0 segment in place when the encoder wrote one, otherwise
/// splices a fresh JFIF APP0 directly after SOI. Non-JPEG input is left
/// untouched.
pub fn stamp_dpi(jpeg: &mut Vec<u8>, dpi: u16) {
    if jpeg.len() < 4 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return;
    }

    if jpeg.len() >= 18 && jpeg[2] == 0xFF && jpeg[3] == 0xE0 && &jpeg[6..11] == b"JFIF\0" {
        jpeg[13] = 1; // units: dots per inch
        jpeg[14..16].copy_from_slice(&dpi.to_be_bytes());
        jpeg[16..18].copy_from_slice(&dpi.to_be_bytes());
        return;
    }

    let mut app0 = Vec::with_capacity(18);
    app0.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    app0.extend_from_slice(b"JFIF\0");
    app0.extend_from_slice(&[0x01, 0x02]); // JFIF version 1.02
    app0.push(1); // dots per inch
    app0.extend_from_slice(&dpi.to_be_bytes());
    app0.extend_from_slice(&dpi.to_be_bytes());
    app0.extend_from_slice(&[0x00, 0x00]); // no thumbnail
    jpeg.splice(2..2, app0);
}

/// Read the JFIF density of an encoded JPEG, as `(units, x, y)`.
pub fn read_dpi(jpeg: &[u8]) -> Option<(u8, u16, u16)> {
    if jpeg.len() < 18 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return None;
    }
    if jpeg[2] != 0xFF || jpeg[3] != 0xE0 || &jpeg[6..11] != b"JFIF\0" {
        return None;
    }
    Some((
        jpeg[13],
        u16::from_be_bytes([jpeg[14], jpeg[15]]),
        u16::from_be_bytes([jpeg[16], jpeg[17]]),
    ))
}

/// Convert white/near-white artwork backgrounds to transparency.
///
/// Edge-aware: pure white drops out completely, off-whites ramp alpha so
/// anti-aliased edges stay smooth. Used for unframed placements where a
/// white artwork background would read as a visible rectangle.
pub fn knockout_white(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut output = RgbaImage::new(width, height);

    const WHITE_THRESHOLD: u8 = 245;
    const LIGHT_THRESHOLD: u8 = 230;
    const EDGE_FEATHER: u8 = 25;

    for y in 0..height {
        for x in 0..width {
            let pixel = rgba.get_pixel(x, y);
            let [r, g, b, a] = pixel.0;

            let luminance = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8;
            let max_channel = r.max(g).max(b);
            let min_channel = r.min(g).min(b);
            let variance = max_channel - min_channel;

            let alpha = if luminance >= WHITE_THRESHOLD && variance <= 15 {
                0
            } else if luminance >= LIGHT_THRESHOLD && variance <= 25 {
                (((255 - luminance) as f32 / (255 - LIGHT_THRESHOLD) as f32) * 255.0)
                    .min(255.0) as u8
            } else if luminance >= LIGHT_THRESHOLD - EDGE_FEATHER && variance <= 35 {
                (((LIGHT_THRESHOLD - luminance.saturating_sub(EDGE_FEATHER)) as f32
                    / EDGE_FEATHER as f32)
                    * 255.0)
                    .min(255.0) as u8
            } else {
                255
            };

            output.put_pixel(x, y, Rgba([r, g, b, alpha.min(a)]));
        }
    }

    debug!(width, height, "Removed white background from artwork");

    DynamicImage::ImageRgba8(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(64, 48, Rgba([120, 60, 30, 255])))
    }

    #[test]
    fn encoded_jpeg_reports_print_density() {
        let bytes = encode_print_jpeg(&sample_image(), 92).unwrap();
        let (units, x, y) = read_dpi(&bytes).expect("JFIF header present");
        assert_eq!(units, 1);
        assert_eq!(x, PRINT_DPI);
        assert_eq!(y, PRINT_DPI);
    }

    #[test]
    fn encoded_jpeg_round_trips_dimensions() {
        let bytes = encode_print_jpeg(&sample_image(), 92).unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn stamp_inserts_app0_when_missing() {
        // SOI followed directly by a bogus APP1 segment
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x02, 0xFF, 0xD9];
        stamp_dpi(&mut bytes, 300);
        let (units, x, _) = read_dpi(&bytes).unwrap();
        assert_eq!(units, 1);
        assert_eq!(x, 300);
    }

    #[test]
    fn stamp_ignores_non_jpeg_bytes() {
        let mut bytes = vec![0x89, b'P', b'N', b'G'];
        stamp_dpi(&mut bytes, 300);
        assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode(&[0x00, 0x01, 0x02, 0x03]).is_err());
    }

    #[test]
    fn knockout_drops_pure_white_keeps_ink() {
        let mut img = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        img.put_pixel(1, 1, Rgba([20, 20, 20, 255]));
        let out = knockout_white(&DynamicImage::ImageRgba8(img)).to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0[3], 0, "white should turn transparent");
        assert_eq!(out.get_pixel(1, 1).0[3], 255, "dark ink should stay opaque");
    }
}
