//! Template authoring: background + mask in, reusable descriptor out
//!
//! The mask is a binary image (white = placement area). Its white region is
//! reduced to exactly four corner points ordered TL, TR, BR, BL, which become
//! the template's quadrilateral geometry. Nothing is persisted until the
//! geometry fully resolves.

use std::sync::Arc;

use chrono::Utc;
use image::{imageops, DynamicImage, GenericImageView, GrayImage};
use imageproc::contours::{find_contours, Contour};
use imageproc::contrast::threshold;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::geometry::{validate_quad, GeometryError};
use crate::domain::{PlacementGeometry, Point, RenderParams, SourceFormat, TemplateDescriptor};
use crate::store::{StoreError, TemplateStore};

/// Authoring errors
#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error("Failed to decode {0} image: {1}")]
    Decode(&'static str, image::ImageError),
    #[error("Mask contains no placement region")]
    EmptyMask,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Caller-supplied authoring metadata
#[derive(Debug, Clone)]
pub struct AuthoringRequest {
    pub room: String,
    /// Auto-generated when absent
    pub template_id: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub render: RenderParams,
    pub overwrite: bool,
}

/// Create a template from a background photo and a binary placement mask.
pub async fn create_template(
    store: &TemplateStore,
    background_bytes: Vec<u8>,
    mask_bytes: Vec<u8>,
    request: AuthoringRequest,
) -> Result<Arc<TemplateDescriptor>, AuthoringError> {
    let background = image::load_from_memory(&background_bytes)
        .map_err(|e| AuthoringError::Decode("background", e))?;
    let mask = image::load_from_memory(&mask_bytes)
        .map_err(|e| AuthoringError::Decode("mask", e))?;

    let (bg_w, bg_h) = background.dimensions();
    let mut mask_gray = mask.to_luma8();
    if mask_gray.dimensions() != (bg_w, bg_h) {
        debug!(
            mask_w = mask_gray.width(),
            mask_h = mask_gray.height(),
            bg_w,
            bg_h,
            "Resizing mask to match background"
        );
        // Nearest keeps the mask binary
        mask_gray = imageops::resize(&mask_gray, bg_w, bg_h, imageops::FilterType::Nearest);
    }

    let corners = detect_mask_corners(&mask_gray)?;
    validate_quad(&corners)?;

    let id = request
        .template_id
        .unwrap_or_else(|| format!("tpl-{}", &Uuid::new_v4().simple().to_string()[..8]));
    let background_file = background_filename(&background_bytes);

    let descriptor = TemplateDescriptor {
        id: id.clone(),
        room: request.room.clone(),
        display_name: request.display_name.unwrap_or_else(|| id.clone()),
        description: request.description,
        tags: request.tags,
        width: bg_w,
        height: bg_h,
        background: background_file,
        geometry: PlacementGeometry::Quadrilateral { corners },
        source: SourceFormat::Manifest,
        render: request.render,
        created_at: Utc::now(),
    };

    let saved = store
        .save(descriptor, background_bytes, None, request.overwrite)
        .await?;

    info!(
        room = %saved.room,
        template_id = %saved.id,
        corners = ?corners,
        "Template authored"
    );
    Ok(saved)
}

/// Detect the mask's white region and reduce it to 4 corners, TL/TR/BR/BL.
///
/// Takes the largest outer contour of the thresholded mask, then picks
/// corners by coordinate sums and differences about the centroid: smallest
/// x+y is TL, largest x+y is BR, largest x-y is TR, smallest x-y is BL.
pub fn detect_mask_corners(mask: &GrayImage) -> Result<[Point; 4], AuthoringError> {
    let binary = threshold(mask, 127);
    let contours: Vec<Contour<i32>> = find_contours(&binary);

    let largest = contours
        .iter()
        .filter(|c| !c.points.is_empty())
        .max_by_key(|c| contour_area(c))
        .ok_or(AuthoringError::EmptyMask)?;

    let mut tl = largest.points[0];
    let mut tr = largest.points[0];
    let mut br = largest.points[0];
    let mut bl = largest.points[0];

    for p in &largest.points {
        if p.x + p.y < tl.x + tl.y {
            tl = *p;
        }
        if p.x + p.y > br.x + br.y {
            br = *p;
        }
        if p.x - p.y > tr.x - tr.y {
            tr = *p;
        }
        if p.x - p.y < bl.x - bl.y {
            bl = *p;
        }
    }

    Ok([
        Point::new(tl.x as f32, tl.y as f32),
        Point::new(tr.x as f32, tr.y as f32),
        Point::new(br.x as f32, br.y as f32),
        Point::new(bl.x as f32, bl.y as f32),
    ])
}

/// Bounding-box area of a contour, used to pick the dominant mask region
fn contour_area(contour: &Contour<i32>) -> i64 {
    let xs = contour.points.iter().map(|p| p.x);
    let ys = contour.points.iter().map(|p| p.y);
    let (min_x, max_x) = (xs.clone().min().unwrap_or(0), xs.max().unwrap_or(0));
    let (min_y, max_y) = (ys.clone().min().unwrap_or(0), ys.max().unwrap_or(0));
    (max_x - min_x) as i64 * (max_y - min_y) as i64
}

/// Keep the uploaded background's container format instead of re-encoding
fn background_filename(bytes: &[u8]) -> String {
    match image::guess_format(bytes) {
        Ok(image::ImageFormat::Jpeg) => "background.jpg".to_string(),
        Ok(image::ImageFormat::WebP) => "background.webp".to_string(),
        _ => "background.png".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba, RgbaImage};

    fn rect_mask(w: u32, h: u32, x0: u32, y0: u32, x1: u32, y1: u32) -> GrayImage {
        let mut mask = GrayImage::new(w, h);
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        mask
    }

    fn png_bytes(w: u32, h: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, pixel));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn gray_to_png(mask: &GrayImage) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(mask.clone());
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn temp_store() -> (std::path::PathBuf, TemplateStore) {
        let dir = std::env::temp_dir().join(format!("roomshot-author-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = TemplateStore::new(&dir, Vec::new());
        (dir, store)
    }

    fn request(room: &str, id: &str, overwrite: bool) -> AuthoringRequest {
        AuthoringRequest {
            room: room.to_string(),
            template_id: Some(id.to_string()),
            display_name: None,
            description: None,
            tags: Vec::new(),
            render: RenderParams::default(),
            overwrite,
        }
    }

    #[test]
    fn detects_rectangle_corners_within_tolerance() {
        let mask = rect_mask(1600, 1200, 400, 200, 1200, 800);
        let corners = detect_mask_corners(&mask).unwrap();

        let expected = [(400.0, 200.0), (1200.0, 200.0), (1200.0, 800.0), (400.0, 800.0)];
        for (corner, (ex, ey)) in corners.iter().zip(expected) {
            assert!(
                (corner.x - ex).abs() <= 2.0 && (corner.y - ey).abs() <= 2.0,
                "corner {:?} not within 2px of ({}, {})",
                corner,
                ex,
                ey
            );
        }
    }

    #[test]
    fn corner_ordering_is_tl_tr_br_bl() {
        let mask = rect_mask(800, 600, 100, 50, 700, 500);
        let [tl, tr, br, bl] = detect_mask_corners(&mask).unwrap();
        assert!(tl.x < tr.x, "TL.x must be left of TR.x");
        assert!(tl.y < bl.y, "TL.y must be above BL.y");
        assert!(bl.x < br.x);
        assert!(tr.y < br.y);
    }

    #[test]
    fn empty_mask_is_rejected() {
        let mask = GrayImage::new(200, 200);
        assert!(matches!(detect_mask_corners(&mask), Err(AuthoringError::EmptyMask)));
    }

    #[test]
    fn largest_region_wins_over_noise() {
        let mut mask = rect_mask(800, 600, 200, 150, 600, 450);
        // a stray white speck
        mask.put_pixel(10, 10, Luma([255]));
        let [tl, ..] = detect_mask_corners(&mask).unwrap();
        assert!((tl.x - 200.0).abs() <= 2.0 && (tl.y - 150.0).abs() <= 2.0);
    }

    #[tokio::test]
    async fn authoring_round_trip_persists_quadrilateral() {
        let (dir, store) = temp_store();
        let background = png_bytes(1600, 1200, Rgba([230, 230, 230, 255]));
        let mask = gray_to_png(&rect_mask(1600, 1200, 400, 200, 1200, 800));

        let saved = create_template(&store, background, mask, request("living_room", "demo", false))
            .await
            .unwrap();

        match &saved.geometry {
            PlacementGeometry::Quadrilateral { corners } => {
                assert!((corners[0].x - 400.0).abs() <= 2.0);
                assert!((corners[2].y - 800.0).abs() <= 2.0);
            }
            other => panic!("expected quadrilateral, got {:?}", other),
        }
        assert_eq!(saved.width, 1600);
        assert!(store.get("living_room", "demo").is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn overwrite_semantics_match_contract() {
        let (dir, store) = temp_store();
        let background = png_bytes(800, 600, Rgba([230, 230, 230, 255]));
        let mask = gray_to_png(&rect_mask(800, 600, 100, 100, 700, 500));

        create_template(
            &store,
            background.clone(),
            mask.clone(),
            request("living_room", "demo", false),
        )
        .await
        .unwrap();

        let second = create_template(
            &store,
            background.clone(),
            mask.clone(),
            request("living_room", "demo", false),
        )
        .await;
        assert!(matches!(
            second,
            Err(AuthoringError::Store(StoreError::AlreadyExists(_, _)))
        ));

        // overwrite=true replaces the geometry
        let new_mask = gray_to_png(&rect_mask(800, 600, 200, 200, 600, 400));
        let replaced = create_template(
            &store,
            background,
            new_mask,
            request("living_room", "demo", true),
        )
        .await
        .unwrap();
        match &replaced.geometry {
            PlacementGeometry::Quadrilateral { corners } => {
                assert!((corners[0].x - 200.0).abs() <= 2.0);
            }
            other => panic!("expected quadrilateral, got {:?}", other),
        }
        let fetched = store.get("living_room", "demo").unwrap();
        match &fetched.geometry {
            PlacementGeometry::Quadrilateral { corners } => {
                assert!((corners[0].x - 200.0).abs() <= 2.0);
            }
            other => panic!("expected quadrilateral, got {:?}", other),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn degenerate_mask_blocks_save() {
        let (dir, store) = temp_store();
        let background = png_bytes(800, 600, Rgba([230, 230, 230, 255]));
        // single-row region: zero height after corner reduction
        let mask = gray_to_png(&rect_mask(800, 600, 100, 100, 700, 101));

        let result = create_template(&store, background, mask, request("office", "flat", false)).await;
        assert!(matches!(result, Err(AuthoringError::Geometry(_))));
        assert!(store.get("office", "flat").is_err(), "no partial template persisted");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn mismatched_mask_is_scaled_to_background() {
        let (dir, store) = temp_store();
        let background = png_bytes(1600, 1200, Rgba([230, 230, 230, 255]));
        // half-resolution mask; corners should land at double its coordinates
        let mask = gray_to_png(&rect_mask(800, 600, 200, 100, 600, 400));

        let saved = create_template(&store, background, mask, request("bedroom", "scaled", false))
            .await
            .unwrap();
        match &saved.geometry {
            PlacementGeometry::Quadrilateral { corners } => {
                assert!((corners[0].x - 400.0).abs() <= 4.0);
                assert!((corners[0].y - 200.0).abs() <= 4.0);
            }
            other => panic!("expected quadrilateral, got {:?}", other),
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
