//! Template descriptors and render parameters
//!
//! A descriptor is the persisted definition of a reusable scene: background
//! asset, placement geometry, render parameters, and how the geometry was
//! authored (hand-built manifest vs PSD placeholder layer).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

use super::geometry::PlacementGeometry;

/// Render-parameter validation errors, raised once at the boundary
#[derive(Debug, Error)]
pub enum ParamError {
    #[error("Unknown blend mode: '{0}' (expected normal|multiply|screen|overlay)")]
    UnknownBlendMode(String),
    #[error("Opacity must be between 0.0 and 1.0, got {0}")]
    InvalidOpacity(f32),
    #[error("Unknown fit mode: '{0}' (expected contain|cover)")]
    UnknownFitMode(String),
    #[error("Field '{field}' is not a valid {expected}: '{value}'")]
    Malformed {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Blend mode applied when compositing artwork over the background
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Normal,
    Multiply,
    Screen,
    Overlay,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Normal
    }
}

impl FromStr for BlendMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(BlendMode::Normal),
            "multiply" => Ok(BlendMode::Multiply),
            "screen" => Ok(BlendMode::Screen),
            "overlay" => Ok(BlendMode::Overlay),
            other => Err(ParamError::UnknownBlendMode(other.to_string())),
        }
    }
}

/// How artwork is scaled into the placement region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FitMode {
    /// Uniform scale so the artwork fits entirely inside the region
    Contain,
    /// Uniform scale so the artwork covers the region (cropped at edges)
    Cover,
}

impl Default for FitMode {
    fn default() -> Self {
        FitMode::Contain
    }
}

impl FromStr for FitMode {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contain" => Ok(FitMode::Contain),
            "cover" => Ok(FitMode::Cover),
            other => Err(ParamError::UnknownFitMode(other.to_string())),
        }
    }
}

/// Validated render parameters for a composite
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct RenderParams {
    #[serde(default)]
    pub blend_mode: BlendMode,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Alpha falloff radius at the placed-artwork boundary, in pixels
    #[serde(default = "default_feather")]
    pub feather_px: u32,
    /// Symmetric inset applied to the target region before fitting
    #[serde(default)]
    pub pad_inset_px: u32,
}

fn default_opacity() -> f32 {
    1.0
}

fn default_feather() -> u32 {
    1
}

impl Default for RenderParams {
    fn default() -> Self {
        RenderParams {
            blend_mode: BlendMode::Normal,
            opacity: 1.0,
            feather_px: 1,
            pad_inset_px: 0,
        }
    }
}

impl RenderParams {
    /// Build from stringly multipart-form fields. Missing fields take
    /// defaults; present-but-invalid fields are rejected, never coerced.
    pub fn from_form_fields(
        blend_mode: Option<&str>,
        opacity: Option<&str>,
        feather_px: Option<&str>,
        pad_inset_px: Option<&str>,
    ) -> Result<Self, ParamError> {
        let mut params = RenderParams::default();
        if let Some(mode) = blend_mode {
            params.blend_mode = mode.parse()?;
        }
        if let Some(raw) = opacity {
            let value: f32 = raw.trim().parse().map_err(|_| ParamError::Malformed {
                field: "opacity",
                expected: "number",
                value: raw.to_string(),
            })?;
            params.opacity = value;
        }
        if let Some(raw) = feather_px {
            params.feather_px = raw.trim().parse().map_err(|_| ParamError::Malformed {
                field: "feather_px",
                expected: "non-negative integer",
                value: raw.to_string(),
            })?;
        }
        if let Some(raw) = pad_inset_px {
            params.pad_inset_px = raw.trim().parse().map_err(|_| ParamError::Malformed {
                field: "pad_inset_px",
                expected: "non-negative integer",
                value: raw.to_string(),
            })?;
        }
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        if !(0.0..=1.0).contains(&self.opacity) || !self.opacity.is_finite() {
            return Err(ParamError::InvalidOpacity(self.opacity));
        }
        Ok(())
    }
}

/// Per-call overrides layered over a template's manifest render parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOverrides {
    pub blend_mode: Option<BlendMode>,
    pub opacity: Option<f32>,
    pub feather_px: Option<u32>,
    pub pad_inset_px: Option<u32>,
}

impl RenderOverrides {
    /// Manifest values win unless the caller supplied an override.
    pub fn apply_to(&self, base: RenderParams) -> RenderParams {
        RenderParams {
            blend_mode: self.blend_mode.unwrap_or(base.blend_mode),
            opacity: self.opacity.unwrap_or(base.opacity),
            feather_px: self.feather_px.unwrap_or(base.feather_px),
            pad_inset_px: self.pad_inset_px.unwrap_or(base.pad_inset_px),
        }
    }
}

/// How a template's geometry was authored
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum SourceFormat {
    /// Hand-authored manifest: background raster + corner points
    Manifest,
    /// PSD with a named placeholder layer; the design file is consulted at
    /// render time rather than trusting cached geometry.
    Layered {
        /// PSD filename inside the template directory
        file: String,
        /// Explicit placeholder layer name; when absent the configured
        /// candidate list is tried in order.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        layer_name: Option<String>,
    },
}

/// A reusable scene definition, persisted as `manifest.json`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TemplateDescriptor {
    pub id: String,
    /// Room category, e.g. "living_room"
    pub room: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Background canvas dimensions
    pub width: u32,
    pub height: u32,
    /// Background raster filename inside the template directory
    pub background: String,
    pub geometry: PlacementGeometry,
    pub source: SourceFormat,
    pub render: RenderParams,
    pub created_at: DateTime<Utc>,
}

impl TemplateDescriptor {
    pub fn is_layered(&self) -> bool {
        matches!(self.source, SourceFormat::Layered { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blend_mode_parses_case_insensitive() {
        assert_eq!(BlendMode::from_str("Multiply").unwrap(), BlendMode::Multiply);
        assert_eq!(BlendMode::from_str(" screen ").unwrap(), BlendMode::Screen);
        assert!(BlendMode::from_str("dissolve").is_err());
    }

    #[test]
    fn form_fields_take_defaults_when_absent() {
        let params = RenderParams::from_form_fields(None, None, None, None).unwrap();
        assert_eq!(params.blend_mode, BlendMode::Normal);
        assert_eq!(params.opacity, 1.0);
        assert_eq!(params.feather_px, 1);
        assert_eq!(params.pad_inset_px, 0);
    }

    #[test]
    fn rejects_out_of_range_opacity() {
        let err = RenderParams::from_form_fields(None, Some("1.5"), None, None);
        assert!(matches!(err, Err(ParamError::InvalidOpacity(_))));
    }

    #[test]
    fn rejects_non_numeric_feather() {
        let err = RenderParams::from_form_fields(None, None, Some("soft"), None);
        assert!(matches!(err, Err(ParamError::Malformed { field: "feather_px", .. })));
    }

    #[test]
    fn descriptor_manifest_round_trip() {
        let json = r#"{
            "id": "living_01",
            "room": "living_room",
            "display_name": "Modern Living Room",
            "tags": ["modern", "bright"],
            "width": 1600,
            "height": 1200,
            "background": "background.jpg",
            "geometry": {
                "type": "quadrilateral",
                "corners": [[400,200],[1200,200],[1200,800],[400,800]]
            },
            "source": { "format": "manifest" },
            "render": { "blend_mode": "normal", "opacity": 1.0, "feather_px": 2, "pad_inset_px": 0 },
            "created_at": "2025-03-14T10:00:00Z"
        }"#;
        let descriptor: TemplateDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(descriptor.room, "living_room");
        assert!(!descriptor.is_layered());
        assert_eq!(descriptor.render.feather_px, 2);
    }
}
