//! Image compositing pipeline
//!
//! Places artwork into a scene background: contain/cover fit for
//! axis-aligned drop zones, four-point perspective warp for quadrilateral
//! frames. The placed layer is then feathered, blended, and encoded as a
//! print-ready JPEG.

use bytes::Bytes;
use image::{imageops, DynamicImage, GenericImageView, Rgba, RgbaImage};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{FitMode, RenderParams, ResolvedGeometry};

use super::blend;
use super::encode;
use super::warp::{self, WarpError};

/// Compositing errors
#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("Failed to decode artwork image: {0}")]
    ArtworkDecode(image::ImageError),
    #[error("Failed to fetch artwork: {0}")]
    FetchFailed(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("Compositing failed: {0}")]
    Compositing(#[from] image::ImageError),
    #[error("Compositing failed: {0}")]
    Warp(#[from] WarpError),
}

/// Resource bounds for the output raster
#[derive(Debug, Clone, Copy)]
pub struct RenderLimits {
    /// Backgrounds larger than this (longest side) trigger a downscale
    pub max_dimension: u32,
    /// Longest side of the downscaled output
    pub downscale_target: u32,
    pub jpeg_quality: u8,
}

impl Default for RenderLimits {
    fn default() -> Self {
        RenderLimits {
            max_dimension: 2400,
            downscale_target: 1920,
            jpeg_quality: 92,
        }
    }
}

/// Per-call compositing options
#[derive(Debug, Clone, Copy)]
pub struct CompositeOptions {
    pub params: RenderParams,
    pub fit: FitMode,
    /// Convert near-white artwork backgrounds to transparency before placing
    pub knockout_white: bool,
}

impl Default for CompositeOptions {
    fn default() -> Self {
        CompositeOptions {
            params: RenderParams::default(),
            fit: FitMode::Contain,
            knockout_white: false,
        }
    }
}

/// Result of a composite: print-resolution JPEG bytes at 300 DPI
pub struct CompositeResult {
    pub template_id: String,
    pub width: u32,
    pub height: u32,
    pub dpi: u16,
    pub bytes: Bytes,
}

/// Image compositor for generating mockups
pub struct Compositor {
    limits: RenderLimits,
    http_client: reqwest::Client,
}

impl Compositor {
    pub fn new(limits: RenderLimits) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent(concat!("Roomshot/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to create HTTP client");

        Compositor { limits, http_client }
    }

    /// Decode artwork bytes, surfacing a typed decode error
    pub fn decode_artwork(&self, bytes: &[u8]) -> Result<DynamicImage, CompositorError> {
        encode::decode(bytes).map_err(CompositorError::ArtworkDecode)
    }

    /// Fetch artwork from a URL (already-authorized collaborator input)
    pub async fn fetch_artwork(&self, url: &str) -> Result<Bytes, CompositorError> {
        debug!(url = %url, "Fetching artwork image");

        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(CompositorError::FetchFailed(format!(
                "HTTP {}: {}",
                response.status(),
                url
            )));
        }

        Ok(response.bytes().await?)
    }

    /// Composite artwork into a background at the resolved geometry.
    pub fn composite(
        &self,
        template_id: &str,
        artwork: &DynamicImage,
        geometry: &ResolvedGeometry,
        background: &DynamicImage,
        options: &CompositeOptions,
    ) -> Result<CompositeResult, CompositorError> {
        let params = &options.params;
        debug!(
            template_id = %template_id,
            artwork_w = artwork.width(),
            artwork_h = artwork.height(),
            feather_px = params.feather_px,
            "Starting composite"
        );

        let mut bg = background.to_rgba8();
        let (bg_w, bg_h) = bg.dimensions();
        if bg_w == 0 || bg_h == 0 {
            return Err(CompositorError::UnsupportedGeometry(
                "background has zero area".to_string(),
            ));
        }

        let prepared;
        let artwork = if options.knockout_white {
            prepared = encode::knockout_white(artwork);
            &prepared
        } else {
            artwork
        };

        let (layer, polygon) = match geometry {
            ResolvedGeometry::Quad { corners } => {
                // Destination canvas sized from the quad's top and left edges
                let dst_w = corners[0].distance(&corners[1]).round() as u32;
                let dst_h = corners[0].distance(&corners[3]).round() as u32;
                let canvas = warp::fit_into_canvas(
                    artwork,
                    dst_w,
                    dst_h,
                    options.fit,
                    params.pad_inset_px,
                )?;
                let layer = warp::warp_onto_quad(&canvas, corners, bg_w, bg_h)?;
                (layer, *corners)
            }
            ResolvedGeometry::Rect { region, blank_backdrop } => {
                let region_w = region.width.round() as u32;
                let region_h = region.height.round() as u32;

                if *blank_backdrop {
                    blend::fill_white_rect(
                        &mut bg,
                        region.x.round() as i32,
                        region.y.round() as i32,
                        region_w,
                        region_h,
                    );
                }

                let canvas = warp::fit_into_canvas(
                    artwork,
                    region_w,
                    region_h,
                    options.fit,
                    params.pad_inset_px,
                )?;

                if region.rotation_degrees != 0.0 {
                    let corners = warp::rotated_rect_corners(
                        region.center(),
                        region.width,
                        region.height,
                        region.rotation_degrees,
                    );
                    let layer = warp::warp_onto_quad(&canvas, &corners, bg_w, bg_h)?;
                    (layer, corners)
                } else {
                    let mut layer = RgbaImage::from_pixel(bg_w, bg_h, Rgba([0, 0, 0, 0]));
                    imageops::overlay(
                        &mut layer,
                        &canvas,
                        region.x.round() as i64,
                        region.y.round() as i64,
                    );
                    let outline =
                        placed_outline(artwork, region, options.fit, params.pad_inset_px);
                    (layer, outline)
                }
            }
        };

        let mask = blend::feather_mask(bg_w, bg_h, &polygon, params.feather_px);
        blend::composite_masked(&mut bg, &layer, &mask, params.blend_mode, params.opacity);

        self.finalize(template_id, DynamicImage::ImageRgba8(bg))
    }

    /// Encode the artwork itself at print quality, the degraded stand-in
    /// used when a template's composite fails inside a batch.
    pub fn encode_artwork_only(
        &self,
        template_id: &str,
        artwork: &DynamicImage,
    ) -> Result<CompositeResult, CompositorError> {
        self.finalize(template_id, artwork.clone())
    }

    /// Apply the downscale ceiling and encode the final JPEG.
    fn finalize(
        &self,
        template_id: &str,
        image: DynamicImage,
    ) -> Result<CompositeResult, CompositorError> {
        let (w, h) = image.dimensions();
        let longest = w.max(h);

        let output = if longest > self.limits.max_dimension {
            let target = self.limits.downscale_target.min(self.limits.max_dimension);
            let scale = target as f64 / longest as f64;
            let new_w = ((w as f64 * scale).round() as u32).max(1);
            let new_h = ((h as f64 * scale).round() as u32).max(1);
            info!(
                from_w = w,
                from_h = h,
                to_w = new_w,
                to_h = new_h,
                "Downscaling oversized output"
            );
            image.resize_exact(new_w, new_h, imageops::FilterType::Lanczos3)
        } else {
            image
        };

        let bytes = encode::encode_print_jpeg(&output, self.limits.jpeg_quality)?;
        let (out_w, out_h) = output.dimensions();

        info!(
            template_id = %template_id,
            width = out_w,
            height = out_h,
            bytes = bytes.len(),
            "Composite encoded"
        );

        Ok(CompositeResult {
            template_id: template_id.to_string(),
            width: out_w,
            height: out_h,
            dpi: encode::PRINT_DPI,
            bytes: Bytes::from(bytes),
        })
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(RenderLimits::default())
    }
}

/// Outline of the artwork as actually placed inside an unrotated region:
/// the contain-fitted rectangle for contain, the region itself for cover
/// (where the overflow is clipped away).
fn placed_outline(
    artwork: &DynamicImage,
    region: &crate::domain::Region,
    fit: FitMode,
    pad_inset_px: u32,
) -> [crate::domain::Point; 4] {
    use crate::domain::Region;

    let region_w = region.width.round() as u32;
    let region_h = region.height.round() as u32;
    let inner_w = region_w.saturating_sub(pad_inset_px * 2).max(1);
    let inner_h = region_h.saturating_sub(pad_inset_px * 2).max(1);

    match fit {
        FitMode::Cover => region.corners(),
        FitMode::Contain => {
            let (fit_w, fit_h) =
                warp::fit_size(artwork.width(), artwork.height(), inner_w, inner_h, fit);
            Region {
                x: region.x + (region_w as f32 - fit_w as f32) / 2.0,
                y: region.y + (region_h as f32 - fit_h as f32) / 2.0,
                width: fit_w as f32,
                height: fit_h as f32,
                rotation_degrees: 0.0,
            }
            .corners()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Point, Region};

    fn compositor() -> Compositor {
        Compositor::new(RenderLimits {
            max_dimension: 4000,
            downscale_target: 1920,
            jpeg_quality: 92,
        })
    }

    fn white_background(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255])))
    }

    fn red_artwork(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([220, 20, 20, 255])))
    }

    fn no_feather_options() -> CompositeOptions {
        CompositeOptions {
            params: RenderParams {
                feather_px: 0,
                ..RenderParams::default()
            },
            ..CompositeOptions::default()
        }
    }

    /// Bounding box of clearly-red pixels in a decoded result
    fn red_bbox(jpeg: &[u8]) -> (u32, u32, u32, u32) {
        let decoded = encode::decode(jpeg).unwrap().to_rgb8();
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
        for (x, y, p) in decoded.enumerate_pixels() {
            if p.0[0] > 150 && p.0[1] < 100 && p.0[2] < 100 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
        (min_x, min_y, max_x, max_y)
    }

    #[test]
    fn axis_aligned_placement_stays_inside_region() {
        let geometry = ResolvedGeometry::Rect {
            region: Region::new(100.0, 100.0, 400.0, 300.0),
            blank_backdrop: false,
        };
        // Wide artwork so contain leaves vertical bands
        let result = compositor()
            .composite(
                "t1",
                &red_artwork(800, 200),
                &geometry,
                &white_background(800, 600),
                &no_feather_options(),
            )
            .unwrap();

        let (min_x, min_y, max_x, max_y) = red_bbox(&result.bytes);
        assert!(min_x >= 98 && min_y >= 98, "artwork leaked above/left of region");
        assert!(max_x <= 502 && max_y <= 402, "artwork leaked below/right of region");
        // contain fit of 4:1 artwork into 400x300 gives 400x100
        let height = max_y - min_y + 1;
        assert!((95..=105).contains(&height), "expected ~100px tall, got {}", height);
    }

    #[test]
    fn quad_placement_covers_quad_interior() {
        let geometry = ResolvedGeometry::Quad {
            corners: [
                Point::new(100.0, 100.0),
                Point::new(300.0, 110.0),
                Point::new(300.0, 300.0),
                Point::new(100.0, 290.0),
            ],
        };
        let result = compositor()
            .composite(
                "t2",
                &red_artwork(200, 200),
                &geometry,
                &white_background(400, 400),
                &no_feather_options(),
            )
            .unwrap();

        let decoded = encode::decode(&result.bytes).unwrap().to_rgb8();
        let center = decoded.get_pixel(200, 200);
        assert!(center.0[0] > 150 && center.0[1] < 100, "quad center not covered");
        let corner = decoded.get_pixel(10, 10);
        assert!(corner.0[0] > 200 && corner.0[1] > 200, "background corner was touched");
    }

    #[test]
    fn output_is_stamped_at_300_dpi_regardless_of_input() {
        // Inputs carrying 72, 150, 300, and no density metadata at all
        let mut inputs = Vec::new();
        for dpi in [72u16, 150, 300] {
            let mut jpeg = encode::encode_print_jpeg(&red_artwork(64, 64), 92).unwrap();
            encode::stamp_dpi(&mut jpeg, dpi);
            inputs.push(jpeg);
        }
        let mut png = Vec::new();
        red_artwork(64, 64)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        inputs.push(png);

        let comp = compositor();
        let geometry = ResolvedGeometry::Rect {
            region: Region::new(10.0, 10.0, 100.0, 100.0),
            blank_backdrop: false,
        };
        for bytes in inputs {
            let artwork = comp.decode_artwork(&bytes).unwrap();
            let result = comp
                .composite(
                    "t3",
                    &artwork,
                    &geometry,
                    &white_background(200, 200),
                    &no_feather_options(),
                )
                .unwrap();
            let (units, x, y) = encode::read_dpi(&result.bytes).unwrap();
            assert_eq!((units, x, y), (1, 300, 300));
            assert_eq!(result.dpi, 300);
        }
    }

    #[test]
    fn identical_inputs_produce_identical_bytes() {
        let comp = compositor();
        let geometry = ResolvedGeometry::Rect {
            region: Region::new(50.0, 50.0, 200.0, 150.0),
            blank_backdrop: false,
        };
        let artwork = red_artwork(300, 200);
        let background = white_background(400, 300);
        let options = CompositeOptions::default();

        let a = comp
            .composite("t4", &artwork, &geometry, &background, &options)
            .unwrap();
        let b = comp
            .composite("t4", &artwork, &geometry, &background, &options)
            .unwrap();
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn oversized_background_is_capped() {
        let comp = Compositor::new(RenderLimits {
            max_dimension: 800,
            downscale_target: 640,
            jpeg_quality: 92,
        });
        let geometry = ResolvedGeometry::Rect {
            region: Region::new(100.0, 100.0, 300.0, 300.0),
            blank_backdrop: false,
        };
        let result = comp
            .composite(
                "t5",
                &red_artwork(200, 200),
                &geometry,
                &white_background(1000, 800),
                &no_feather_options(),
            )
            .unwrap();

        assert_eq!(result.width.max(result.height), 640);
        // aspect preserved
        let ratio = result.width as f64 / result.height as f64;
        assert!((ratio - 1000.0 / 800.0).abs() < 0.01);
    }

    #[test]
    fn blank_backdrop_whites_out_placement_area() {
        let comp = compositor();
        let geometry = ResolvedGeometry::Rect {
            region: Region::new(20.0, 20.0, 60.0, 60.0),
            blank_backdrop: true,
        };
        // Fully transparent artwork: only the white underlay should show
        let artwork =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 0])));
        let background =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(100, 100, Rgba([10, 10, 10, 255])));
        let result = comp
            .composite("t6", &artwork, &geometry, &background, &no_feather_options())
            .unwrap();

        let decoded = encode::decode(&result.bytes).unwrap().to_rgb8();
        assert!(decoded.get_pixel(50, 50).0[0] > 230, "underlay missing");
        assert!(decoded.get_pixel(5, 5).0[0] < 40, "background overwritten");
    }

    #[test]
    fn rotated_region_keeps_artwork_near_region() {
        let comp = compositor();
        let geometry = ResolvedGeometry::Rect {
            region: Region {
                x: 100.0,
                y: 100.0,
                width: 200.0,
                height: 150.0,
                rotation_degrees: -2.0,
            },
            blank_backdrop: false,
        };
        let result = comp
            .composite(
                "t7",
                &red_artwork(200, 150),
                &geometry,
                &white_background(400, 400),
                &no_feather_options(),
            )
            .unwrap();
        let (min_x, min_y, max_x, max_y) = red_bbox(&result.bytes);
        // a 2-degree tilt moves corners only a few pixels
        assert!(min_x >= 85 && min_y >= 85);
        assert!(max_x <= 315 && max_y <= 265);
    }
}
