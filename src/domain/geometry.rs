//! Placement geometry for mockup templates
//!
//! A template places artwork either into an axis-aligned drop zone (contain
//! fit, optional rotation) or into a four-corner quadrilateral that the
//! artwork is perspective-warped onto.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Geometry errors
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("Placement region resolves to zero area: width={0}, height={1}")]
    Degenerate(f32, f32),
    #[error("Quadrilateral corners are not a simple TL/TR/BR/BL polygon")]
    MalformedQuad,
    #[error("Placeholder layer not found: tried {0}")]
    PlaceholderNotFound(String),
    #[error("Perspective warp is not supported for {0} templates")]
    UnsupportedWarp(String),
}

/// A 2D point in template pixel coordinates.
///
/// Serialized as a `[x, y]` pair so manifests keep the compact corner-array
/// format authored by the template tooling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Point { x: p[0], y: p[1] }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// An axis-aligned drop zone, optionally rotated around its own center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees around the region center (positive = clockwise)
    #[serde(default)]
    pub rotation_degrees: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Region { x, y, width, height, rotation_degrees: 0.0 }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Corners in TL, TR, BR, BL order (ignores rotation)
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }
}

/// Placement geometry as persisted in a template manifest
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlacementGeometry {
    /// Four corners ordered TL, TR, BR, BL; artwork is perspective-warped
    /// onto the quad.
    Quadrilateral { corners: [Point; 4] },
    /// Simple rectangular drop zone; artwork is contain-fitted and centered.
    Region(Region),
}

/// Geometry after resolution, ready for the compositor.
#[derive(Debug, Clone)]
pub enum ResolvedGeometry {
    /// Axis-aligned placement. `blank_backdrop` asks the compositor to paint
    /// an opaque white rectangle behind the artwork (layered-placeholder
    /// templates, where the original smart-object pixels must never leak
    /// through semi-transparent artwork edges).
    Rect { region: Region, blank_backdrop: bool },
    /// Perspective placement onto a validated quad.
    Quad { corners: [Point; 4] },
}

/// Resolve manifest geometry into compositor-ready geometry.
///
/// Quadrilaterals are validated for TL/TR/BR/BL ordering and convexity;
/// regions are validated for positive area.
pub fn resolve(geometry: &PlacementGeometry) -> Result<ResolvedGeometry, GeometryError> {
    match geometry {
        PlacementGeometry::Region(region) => {
            if region.width <= 0.0 || region.height <= 0.0 {
                return Err(GeometryError::Degenerate(region.width, region.height));
            }
            Ok(ResolvedGeometry::Rect { region: *region, blank_backdrop: false })
        }
        PlacementGeometry::Quadrilateral { corners } => {
            validate_quad(corners)?;
            Ok(ResolvedGeometry::Quad { corners: *corners })
        }
    }
}

/// Validate a TL/TR/BR/BL quad: positive edge lengths, consistent winding.
///
/// Consistent winding across all four vertices implies a convex, simple
/// polygon, which is what the fill/warp pipeline requires.
pub fn validate_quad(corners: &[Point; 4]) -> Result<(), GeometryError> {
    let [tl, tr, _, bl] = corners;

    let top = tl.distance(tr);
    let left = tl.distance(bl);
    if top < 1.0 || left < 1.0 {
        return Err(GeometryError::Degenerate(top, left));
    }

    // Cross product of consecutive edges must keep the same sign all the way
    // around. In image coordinates (y down) TL->TR->BR->BL winds positive.
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = corners[i];
        let b = corners[(i + 1) % 4];
        let c = corners[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < f32::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return Err(GeometryError::MalformedQuad);
        }
    }
    if sign <= 0.0 {
        // Zero: all corners collinear. Negative: corners run TL,TR,BR,BL in
        // the wrong direction (e.g. TL/TR swapped).
        return Err(GeometryError::MalformedQuad);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: [(f32, f32); 4]) -> [Point; 4] {
        [
            Point::new(points[0].0, points[0].1),
            Point::new(points[1].0, points[1].1),
            Point::new(points[2].0, points[2].1),
            Point::new(points[3].0, points[3].1),
        ]
    }

    #[test]
    fn resolves_rectangular_region() {
        let g = PlacementGeometry::Region(Region::new(400.0, 200.0, 800.0, 600.0));
        match resolve(&g).unwrap() {
            ResolvedGeometry::Rect { region, blank_backdrop } => {
                assert_eq!(region.width, 800.0);
                assert!(!blank_backdrop);
            }
            _ => panic!("expected rect"),
        }
    }

    #[test]
    fn rejects_zero_area_region() {
        let g = PlacementGeometry::Region(Region::new(0.0, 0.0, 0.0, 600.0));
        assert!(matches!(resolve(&g), Err(GeometryError::Degenerate(_, _))));
    }

    #[test]
    fn accepts_tilted_convex_quad() {
        let corners = quad([(100.0, 120.0), (900.0, 80.0), (920.0, 700.0), (110.0, 660.0)]);
        assert!(validate_quad(&corners).is_ok());
    }

    #[test]
    fn rejects_self_intersecting_quad() {
        // TR and BR swapped: the outline crosses itself
        let corners = quad([(0.0, 0.0), (100.0, 0.0), (0.0, 100.0), (100.0, 100.0)]);
        assert!(matches!(validate_quad(&corners), Err(GeometryError::MalformedQuad)));
    }

    #[test]
    fn rejects_collinear_corners() {
        let corners = quad([(0.0, 0.0), (50.0, 0.0), (100.0, 0.0), (150.0, 0.0)]);
        assert!(validate_quad(&corners).is_err());
    }

    #[test]
    fn point_serializes_as_pair() {
        let p = Point::new(400.0, 200.0);
        assert_eq!(serde_json::to_string(&p).unwrap(), "[400.0,200.0]");
        let back: Point = serde_json::from_str("[400.0,200.0]").unwrap();
        assert_eq!(back, p);
    }
}
