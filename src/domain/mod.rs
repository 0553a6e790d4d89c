//! Domain types and models

pub mod geometry;
pub mod template;

pub use geometry::{GeometryError, PlacementGeometry, Point, Region, ResolvedGeometry};
pub use template::{
    BlendMode, FitMode, ParamError, RenderOverrides, RenderParams, SourceFormat,
    TemplateDescriptor,
};
