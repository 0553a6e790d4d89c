//! Planar warp: fit math and perspective projection
//!
//! Artwork is first resampled onto a transparent canvas the size of the
//! target region (contain or cover fit, centered, optional pad inset), then
//! either pasted directly (axis-aligned placement) or pushed through a
//! four-point homography onto the destination quadrilateral.

use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use thiserror::Error;

use crate::domain::{FitMode, Point};

#[derive(Debug, Error)]
pub enum WarpError {
    #[error("Destination frame too small: {0}x{1}")]
    FrameTooSmall(u32, u32),
    #[error("Failed to compute projection from corner points")]
    ProjectionFailed,
}

/// Fitted dimensions for placing `src` into a `dst` box.
pub fn fit_size(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, mode: FitMode) -> (u32, u32) {
    let r_src = src_w as f64 / src_h as f64;
    let r_dst = dst_w as f64 / dst_h as f64;

    let (w, h) = match mode {
        FitMode::Cover => {
            if r_src < r_dst {
                let w = dst_w as f64;
                (w, w / r_src)
            } else {
                let h = dst_h as f64;
                (h * r_src, h)
            }
        }
        FitMode::Contain => {
            if r_src > r_dst {
                let w = dst_w as f64;
                (w, w / r_src)
            } else {
                let h = dst_h as f64;
                (h * r_src, h)
            }
        }
    };

    ((w.round() as u32).max(1), (h.round() as u32).max(1))
}

/// Resample artwork onto a transparent RGBA canvas of exactly
/// `region_w x region_h`, fitted and centered, with a symmetric pad inset.
pub fn fit_into_canvas(
    artwork: &DynamicImage,
    region_w: u32,
    region_h: u32,
    fit: FitMode,
    pad_inset_px: u32,
) -> Result<RgbaImage, WarpError> {
    if region_w < 2 || region_h < 2 {
        return Err(WarpError::FrameTooSmall(region_w, region_h));
    }

    let inner_w = region_w.saturating_sub(pad_inset_px * 2).max(1);
    let inner_h = region_h.saturating_sub(pad_inset_px * 2).max(1);

    let (fit_w, fit_h) = fit_size(artwork.width(), artwork.height(), inner_w, inner_h, fit);
    let resized = artwork
        .resize_exact(fit_w, fit_h, imageops::FilterType::Lanczos3)
        .to_rgba8();

    let mut canvas = RgbaImage::from_pixel(region_w, region_h, Rgba([0, 0, 0, 0]));
    // Cover fit can exceed the region; center and let overlay clip the rest.
    let ox = (region_w as i64 - fit_w as i64) / 2;
    let oy = (region_h as i64 - fit_h as i64) / 2;
    imageops::overlay(&mut canvas, &resized, ox, oy);

    Ok(canvas)
}

/// Warp an artwork canvas onto a destination quadrilateral inside an
/// `out_w x out_h` buffer (the background's dimensions). Corners are ordered
/// TL, TR, BR, BL. Pixels outside the quad stay fully transparent.
pub fn warp_onto_quad(
    canvas: &RgbaImage,
    corners: &[Point; 4],
    out_w: u32,
    out_h: u32,
) -> Result<RgbaImage, WarpError> {
    let (w, h) = canvas.dimensions();
    let from = [
        (0.0, 0.0),
        (w as f32, 0.0),
        (w as f32, h as f32),
        (0.0, h as f32),
    ];
    let to = [
        (corners[0].x, corners[0].y),
        (corners[1].x, corners[1].y),
        (corners[2].x, corners[2].y),
        (corners[3].x, corners[3].y),
    ];

    let projection =
        Projection::from_control_points(from, to).ok_or(WarpError::ProjectionFailed)?;

    let mut out = RgbaImage::from_pixel(out_w, out_h, Rgba([0, 0, 0, 0]));
    warp_into(
        canvas,
        &projection,
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
        &mut out,
    );
    Ok(out)
}

/// Corners of a `w x h` rectangle centered at `center`, rotated by
/// `degrees` (clockwise in image coordinates), ordered TL, TR, BR, BL.
pub fn rotated_rect_corners(center: Point, w: f32, h: f32, degrees: f32) -> [Point; 4] {
    let rad = degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    let (hw, hh) = (w / 2.0, h / 2.0);

    let rotate = |dx: f32, dy: f32| Point {
        x: center.x + dx * cos - dy * sin,
        y: center.y + dx * sin + dy * cos,
    };

    [
        rotate(-hw, -hh),
        rotate(hw, -hh),
        rotate(hw, hh),
        rotate(-hw, hh),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_artwork(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([200, 40, 40, 255])))
    }

    #[test]
    fn contain_preserves_aspect_ratio() {
        // square, portrait 2:3, landscape 16:9
        for (w, h) in [(500, 500), (400, 600), (1600, 900)] {
            let (fw, fh) = fit_size(w, h, 800, 600, FitMode::Contain);
            let src_ratio = w as f64 / h as f64;
            let fit_ratio = fw as f64 / fh as f64;
            assert!(
                (src_ratio - fit_ratio).abs() / src_ratio < 0.01,
                "ratio drifted for {}x{}: {} vs {}",
                w,
                h,
                src_ratio,
                fit_ratio
            );
        }
    }

    #[test]
    fn contain_never_overflows_region() {
        for (w, h) in [(500, 500), (400, 600), (1600, 900), (3000, 100), (100, 3000)] {
            let (fw, fh) = fit_size(w, h, 800, 600, FitMode::Contain);
            assert!(fw <= 800 && fh <= 600, "{}x{} overflowed to {}x{}", w, h, fw, fh);
        }
    }

    #[test]
    fn cover_fills_region() {
        for (w, h) in [(500, 500), (400, 600), (1600, 900)] {
            let (fw, fh) = fit_size(w, h, 800, 600, FitMode::Cover);
            assert!(fw >= 800 && fh >= 600);
        }
    }

    #[test]
    fn fitted_canvas_is_region_sized_and_centered() {
        let art = solid_artwork(400, 400);
        let canvas = fit_into_canvas(&art, 800, 600, FitMode::Contain, 0).unwrap();
        assert_eq!(canvas.dimensions(), (800, 600));
        // 400x400 contain-fits 800x600 as 600x600, so 100px transparent bands
        // remain on each side
        assert_eq!(canvas.get_pixel(50, 300).0[3], 0);
        assert_eq!(canvas.get_pixel(750, 300).0[3], 0);
        assert_eq!(canvas.get_pixel(400, 300).0[3], 255);
    }

    #[test]
    fn pad_inset_shrinks_placement() {
        let art = solid_artwork(800, 600);
        let canvas = fit_into_canvas(&art, 800, 600, FitMode::Contain, 50).unwrap();
        // With a 50px inset the artwork occupies at most 700x500, centered
        assert_eq!(canvas.get_pixel(20, 300).0[3], 0);
        assert_eq!(canvas.get_pixel(400, 20).0[3], 0);
        assert_eq!(canvas.get_pixel(400, 300).0[3], 255);
    }

    #[test]
    fn tiny_frame_is_rejected() {
        let art = solid_artwork(100, 100);
        assert!(matches!(
            fit_into_canvas(&art, 1, 600, FitMode::Contain, 0),
            Err(WarpError::FrameTooSmall(_, _))
        ));
    }

    #[test]
    fn warp_lands_inside_quad() {
        let art = solid_artwork(200, 200);
        let canvas = fit_into_canvas(&art, 200, 200, FitMode::Contain, 0).unwrap();
        let corners = [
            Point::new(100.0, 100.0),
            Point::new(300.0, 120.0),
            Point::new(310.0, 320.0),
            Point::new(90.0, 300.0),
        ];
        let warped = warp_onto_quad(&canvas, &corners, 400, 400).unwrap();
        assert_eq!(warped.dimensions(), (400, 400));
        // center of the quad is covered, far corners of the buffer are not
        assert!(warped.get_pixel(200, 210).0[3] > 0);
        assert_eq!(warped.get_pixel(5, 5).0[3], 0);
        assert_eq!(warped.get_pixel(395, 395).0[3], 0);
    }

    #[test]
    fn rotation_by_zero_is_identity() {
        let corners = rotated_rect_corners(Point::new(100.0, 100.0), 80.0, 40.0, 0.0);
        assert_eq!(corners[0], Point::new(60.0, 80.0));
        assert_eq!(corners[2], Point::new(140.0, 120.0));
    }

    #[test]
    fn rotated_corners_keep_winding() {
        let corners = rotated_rect_corners(Point::new(100.0, 100.0), 80.0, 40.0, -2.0);
        crate::domain::geometry::validate_quad(&corners).unwrap();
    }
}
