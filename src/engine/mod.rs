//! Mockup generation engine
//!
//! This module contains the core compositing logic:
//! - Planar warp (contain/cover fit + four-point perspective)
//! - Blend modes, feathered masks, and the composite pipeline
//! - PSD placeholder parsing for layered templates
//! - Template authoring from background + mask
//! - Batch fan-out across a room's templates
//! - Print-format size variants and procedural seed scenes

pub mod authoring;
pub mod batch;
pub mod blend;
pub mod compositor;
pub mod encode;
pub mod formats;
pub mod layered;
pub mod scene;
pub mod warp;

pub use authoring::{create_template, AuthoringError, AuthoringRequest};
pub use batch::{BatchError, BatchOptions, BatchOrchestrator, MockupBatchResult, TemplateOutcome};
pub use compositor::{
    CompositeOptions, CompositeResult, Compositor, CompositorError, RenderLimits,
};
