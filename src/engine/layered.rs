//! Layered design-file (PSD) parsing
//!
//! Wraps the PSD container as an immutable document: a tree of named,
//! bounded, visibility-flagged nodes plus whole-document rendering with an
//! exclusion set of layer names. Nothing here mutates layer state; hiding a
//! layer for rendering is expressed as a filter, not an in-place flag flip.

use std::collections::{HashMap, HashSet};

use image::RgbaImage;
use psd::{Psd, PsdLayer};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum LayeredError {
    #[error("Failed to parse design file: {0}")]
    Parse(String),
    #[error("Failed to render design file: {0}")]
    Render(String),
    #[error("Design file produced an invalid {0}x{1} raster")]
    InvalidRaster(u32, u32),
}

/// Layer name that overrides the placeholder's own bounds when present.
/// Placeholder layers are routinely larger than the visible frame opening.
const FRAME_LAYER: &str = "frame";

/// A node in the layer tree (group or leaf layer)
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LayerNode {
    pub name: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub visible: bool,
    pub group: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<LayerNode>,
}

/// The placement rectangle resolved from a placeholder layer
#[derive(Debug, Clone)]
pub struct PlaceholderRegion {
    /// The placeholder layer's own (normalized-matched) name
    pub layer_name: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// True when a `frame` layer supplied the bounds instead of the
    /// placeholder itself
    pub from_frame: bool,
}

/// Trimmed, case-insensitive form used for all layer-name comparisons
pub fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Fuzzy layer-name match: exact, or equal after normalization
pub fn name_matches(layer: &str, wanted: &str) -> bool {
    layer == wanted || normalize_name(layer) == normalize_name(wanted)
}

/// An immutable, parsed layered design document
pub struct LayeredDocument {
    psd: Psd,
}

impl LayeredDocument {
    pub fn parse(bytes: &[u8]) -> Result<Self, LayeredError> {
        let psd = Psd::from_bytes(bytes).map_err(|e| LayeredError::Parse(e.to_string()))?;
        Ok(LayeredDocument { psd })
    }

    pub fn width(&self) -> u32 {
        self.psd.width()
    }

    pub fn height(&self) -> u32 {
        self.psd.height()
    }

    /// Find a layer by fuzzy name match, returning its bounds
    pub fn find_layer(&self, wanted: &str) -> Option<PlaceholderRegion> {
        self.psd
            .layers()
            .iter()
            .find(|layer| name_matches(layer.name(), wanted))
            .map(|layer| region_from_layer(layer, false))
    }

    /// Locate the artwork placeholder: the explicit name (when configured on
    /// the template) first, then the candidate list in order. If a `frame`
    /// layer exists with usable bounds, its rectangle wins over the
    /// placeholder's own, as the visible opening.
    pub fn find_placeholder(
        &self,
        explicit: Option<&str>,
        candidates: &[String],
    ) -> Option<PlaceholderRegion> {
        let placeholder = explicit
            .and_then(|name| self.find_layer(name))
            .or_else(|| {
                candidates
                    .iter()
                    .find_map(|candidate| self.find_layer(candidate))
            })?;

        if let Some(frame) = self.find_layer(FRAME_LAYER) {
            if frame.width > 0 && frame.height > 0 {
                return Some(PlaceholderRegion {
                    layer_name: placeholder.layer_name,
                    left: frame.left,
                    top: frame.top,
                    width: frame.width,
                    height: frame.height,
                    from_frame: true,
                });
            }
        }

        Some(placeholder)
    }

    /// All layer names, flat (used in not-found diagnostics)
    pub fn layer_names(&self) -> Vec<String> {
        self.psd
            .layers()
            .iter()
            .map(|layer| layer.name().to_string())
            .collect()
    }

    /// The layer tree: groups with their member layers, root layers last.
    pub fn tree(&self) -> Vec<LayerNode> {
        let mut group_nodes: HashMap<u32, LayerNode> = self
            .psd
            .groups()
            .iter()
            .map(|(id, group)| {
                (
                    *id,
                    LayerNode {
                        name: group.name().to_string(),
                        left: 0,
                        top: 0,
                        width: 0,
                        height: 0,
                        visible: true,
                        group: true,
                        children: Vec::new(),
                    },
                )
            })
            .collect();

        let mut roots = Vec::new();
        for layer in self.psd.layers() {
            let node = layer_node(layer);
            match layer.parent_id().and_then(|id| group_nodes.get_mut(&id)) {
                Some(parent) => parent.children.push(node),
                None => roots.push(node),
            }
        }

        // Derive group bounds from their members
        let mut groups: Vec<LayerNode> = group_nodes.into_values().collect();
        for group in &mut groups {
            if let Some(bounds) = union_bounds(&group.children) {
                (group.left, group.top, group.width, group.height) = bounds;
            }
        }

        groups.extend(roots);
        groups
    }

    /// Render the full document (all visible layers)
    pub fn render(&self) -> Result<RgbaImage, LayeredError> {
        let raster = self.psd.rgba();
        raster_to_image(self.width(), self.height(), raster)
    }

    /// Render the document with the named layers excluded, leaving every
    /// other visible layer in place.
    pub fn render_excluding(&self, excluded: &[String]) -> Result<RgbaImage, LayeredError> {
        let excluded: HashSet<String> = excluded.iter().map(|n| normalize_name(n)).collect();
        let raster = self
            .psd
            .flatten_layers_rgba(&|(_idx, layer): (usize, &PsdLayer)| {
                layer.visible() && !excluded.contains(&normalize_name(layer.name()))
            })
            .map_err(|e| LayeredError::Render(e.to_string()))?;
        raster_to_image(self.width(), self.height(), raster)
    }
}

fn layer_node(layer: &PsdLayer) -> LayerNode {
    let region = region_from_layer(layer, false);
    LayerNode {
        name: region.layer_name,
        left: region.left,
        top: region.top,
        width: region.width,
        height: region.height,
        visible: layer.visible(),
        group: false,
        children: Vec::new(),
    }
}

fn region_from_layer(layer: &PsdLayer, from_frame: bool) -> PlaceholderRegion {
    PlaceholderRegion {
        layer_name: layer.name().to_string(),
        left: layer.layer_left(),
        top: layer.layer_top(),
        width: layer.layer_right() - layer.layer_left(),
        height: layer.layer_bottom() - layer.layer_top(),
        from_frame,
    }
}

fn union_bounds(nodes: &[LayerNode]) -> Option<(i32, i32, i32, i32)> {
    let first = nodes.first()?;
    let (mut left, mut top) = (first.left, first.top);
    let (mut right, mut bottom) = (first.left + first.width, first.top + first.height);
    for node in &nodes[1..] {
        left = left.min(node.left);
        top = top.min(node.top);
        right = right.max(node.left + node.width);
        bottom = bottom.max(node.top + node.height);
    }
    Some((left, top, right - left, bottom - top))
}

fn raster_to_image(width: u32, height: u32, raster: Vec<u8>) -> Result<RgbaImage, LayeredError> {
    RgbaImage::from_raw(width, height, raster)
        .ok_or(LayeredError::InvalidRaster(width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_matching_is_trimmed_and_case_insensitive() {
        assert!(name_matches("  Your Design Here ", "your design here"));
        assert!(name_matches("FRAME", "frame"));
        assert!(!name_matches("Background", "frame"));
    }

    #[test]
    fn union_bounds_covers_all_children() {
        let child = |left, top, width, height| LayerNode {
            name: String::new(),
            left,
            top,
            width,
            height,
            visible: true,
            group: false,
            children: Vec::new(),
        };
        let bounds = union_bounds(&[child(10, 10, 20, 20), child(50, 5, 30, 10)]).unwrap();
        assert_eq!(bounds, (10, 5, 70, 25));
    }

    #[test]
    fn union_bounds_of_empty_group_is_none() {
        assert!(union_bounds(&[]).is_none());
    }
}
