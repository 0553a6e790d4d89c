//! Batch orchestration: one artwork against every template in a room
//!
//! Templates are independent; a failure on one records an outcome and moves
//! on. When a composite fails outright the slot is filled with a degraded
//! stand-in (the artwork re-encoded at print quality) so downstream packaging
//! always has something per template. Concurrency is semaphore-bounded;
//! each composite can hold a full-resolution raster.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::DynamicImage;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::domain::{FitMode, RenderOverrides, TemplateDescriptor};
use crate::store::TemplateStore;

use super::compositor::{CompositeOptions, CompositeResult, Compositor, CompositorError};

/// Batch-level failures (anything per-template is recorded, not raised)
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No templates registered for room: {0}")]
    RoomEmpty(String),
    #[error(transparent)]
    Compositor(#[from] CompositorError),
}

/// Outcome for a single template slot
pub enum TemplateOutcome {
    /// Full composite
    Success(CompositeResult),
    /// Composite failed; the artwork itself stands in for the mockup
    Degraded { result: CompositeResult, reason: String },
    /// Even the stand-in could not be produced
    Failed { reason: String },
}

impl TemplateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TemplateOutcome::Success(_))
    }
}

/// Result of a batch run: exactly one outcome per template in the room
pub struct MockupBatchResult {
    pub room: String,
    pub outcomes: BTreeMap<String, TemplateOutcome>,
}

impl MockupBatchResult {
    pub fn success_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_success()).count()
    }
}

/// Per-batch options applied on top of each template's manifest parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    pub overrides: RenderOverrides,
    pub fit: FitMode,
    pub knockout_white: bool,
}

/// Fans one artwork out across every template in a room
pub struct BatchOrchestrator {
    store: Arc<TemplateStore>,
    compositor: Arc<Compositor>,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(store: Arc<TemplateStore>, compositor: Arc<Compositor>, concurrency: usize) -> Self {
        BatchOrchestrator {
            store,
            compositor,
            concurrency: concurrency.clamp(1, 16),
        }
    }

    /// Composite `artwork` against every template registered for `room`.
    ///
    /// Returns exactly one outcome per template; never aborts on a
    /// per-template failure.
    pub async fn generate_for_room(
        &self,
        artwork_bytes: &[u8],
        room: &str,
        options: BatchOptions,
    ) -> Result<MockupBatchResult, BatchError> {
        let templates = self.store.list(Some(room));
        if templates.is_empty() {
            return Err(BatchError::RoomEmpty(room.to_string()));
        }

        // Decode once; a bad artwork fails the whole batch before fan-out
        let artwork = Arc::new(self.compositor.decode_artwork(artwork_bytes)?);

        info!(
            room = %room,
            templates = templates.len(),
            concurrency = self.concurrency,
            "Starting mockup batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(templates.len());

        for descriptor in templates {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("batch semaphore closed");
            let store = self.store.clone();
            let compositor = self.compositor.clone();
            let artwork = artwork.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                let id = descriptor.id.clone();
                let outcome = tokio::task::spawn_blocking(move || {
                    composite_one(&store, &compositor, &descriptor, &artwork, options)
                })
                .await
                .unwrap_or_else(|e| TemplateOutcome::Failed {
                    reason: format!("composite task failed: {}", e),
                });
                (id, outcome)
            });
            handles.push(handle);
        }

        let mut outcomes = BTreeMap::new();
        for handle in handles {
            match handle.await {
                Ok((id, outcome)) => {
                    outcomes.insert(id, outcome);
                }
                Err(e) => {
                    warn!(error = %e, "Batch worker join failed");
                }
            }
        }

        let result = MockupBatchResult {
            room: room.to_string(),
            outcomes,
        };
        info!(
            room = %room,
            total = result.outcomes.len(),
            succeeded = result.success_count(),
            "Mockup batch finished"
        );
        Ok(result)
    }
}

/// Resolve and composite a single template, degrading instead of failing.
fn composite_one(
    store: &TemplateStore,
    compositor: &Compositor,
    descriptor: &TemplateDescriptor,
    artwork: &DynamicImage,
    options: BatchOptions,
) -> TemplateOutcome {
    let attempt = store
        .resolve_scene(descriptor)
        .map_err(|e| e.to_string())
        .and_then(|scene| {
            let composite_options = CompositeOptions {
                params: options.overrides.apply_to(scene.render),
                fit: options.fit,
                knockout_white: options.knockout_white,
            };
            compositor
                .composite(
                    &descriptor.id,
                    artwork,
                    &scene.geometry,
                    &scene.background,
                    &composite_options,
                )
                .map_err(|e| e.to_string())
        });

    match attempt {
        Ok(result) => TemplateOutcome::Success(result),
        Err(reason) => {
            warn!(
                room = %descriptor.room,
                template_id = %descriptor.id,
                reason = %reason,
                "Composite failed, falling back to plain artwork"
            );
            match compositor.encode_artwork_only(&descriptor.id, artwork) {
                Ok(result) => TemplateOutcome::Degraded { result, reason },
                Err(e) => TemplateOutcome::Failed {
                    reason: format!("{}; fallback encode failed: {}", reason, e),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        PlacementGeometry, Point, Region, RenderParams, SourceFormat,
    };
    use crate::engine::compositor::RenderLimits;
    use chrono::Utc;
    use image::{Rgba, RgbaImage};

    fn png_bytes(w: u32, h: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, pixel));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn manifest_descriptor(room: &str, id: &str) -> TemplateDescriptor {
        TemplateDescriptor {
            id: id.to_string(),
            room: room.to_string(),
            display_name: id.to_string(),
            description: None,
            tags: Vec::new(),
            width: 400,
            height: 300,
            background: "background.png".to_string(),
            geometry: PlacementGeometry::Quadrilateral {
                corners: [
                    Point::new(50.0, 50.0),
                    Point::new(350.0, 60.0),
                    Point::new(340.0, 250.0),
                    Point::new(60.0, 240.0),
                ],
            },
            source: SourceFormat::Manifest,
            render: RenderParams::default(),
            created_at: Utc::now(),
        }
    }

    async fn seeded_room() -> (std::path::PathBuf, Arc<TemplateStore>) {
        let dir = std::env::temp_dir().join(format!("roomshot-batch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Arc::new(TemplateStore::new(&dir, Vec::new()));

        for id in ["scene_a", "scene_b"] {
            store
                .save(
                    manifest_descriptor("living_room", id),
                    png_bytes(400, 300, Rgba([240, 240, 240, 255])),
                    None,
                    false,
                )
                .await
                .unwrap();
        }

        // Layered template whose design file is deliberately missing
        let mut broken = manifest_descriptor("living_room", "scene_broken");
        broken.geometry = PlacementGeometry::Region(Region::new(10.0, 10.0, 100.0, 80.0));
        broken.source = SourceFormat::Layered {
            file: "scene.psd".to_string(),
            layer_name: None,
        };
        store
            .save(broken, png_bytes(400, 300, Rgba([240, 240, 240, 255])), None, false)
            .await
            .unwrap();

        (dir, store)
    }

    #[tokio::test]
    async fn partial_failure_fills_every_slot() {
        let (dir, store) = seeded_room().await;
        let orchestrator = BatchOrchestrator::new(
            store,
            Arc::new(Compositor::new(RenderLimits::default())),
            3,
        );

        let artwork = png_bytes(200, 200, Rgba([200, 30, 30, 255]));
        let result = orchestrator
            .generate_for_room(&artwork, "living_room", BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(result.outcomes.len(), 3, "one outcome per template");
        assert_eq!(result.success_count(), 2);
        match result.outcomes.get("scene_broken").unwrap() {
            TemplateOutcome::Degraded { result, reason } => {
                assert!(!result.bytes.is_empty(), "degraded slot still carries an image");
                assert!(!reason.is_empty());
            }
            _ => panic!("broken template should degrade, not vanish"),
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn empty_room_is_an_error() {
        let dir = std::env::temp_dir().join(format!("roomshot-batch-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Arc::new(TemplateStore::new(&dir, Vec::new()));
        let orchestrator = BatchOrchestrator::new(
            store,
            Arc::new(Compositor::new(RenderLimits::default())),
            3,
        );

        let artwork = png_bytes(50, 50, Rgba([200, 30, 30, 255]));
        let result = orchestrator
            .generate_for_room(&artwork, "nowhere", BatchOptions::default())
            .await;
        assert!(matches!(result, Err(BatchError::RoomEmpty(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn undecodable_artwork_fails_before_fanout() {
        let (dir, store) = seeded_room().await;
        let orchestrator = BatchOrchestrator::new(
            store,
            Arc::new(Compositor::new(RenderLimits::default())),
            3,
        );

        let result = orchestrator
            .generate_for_room(&[0, 1, 2, 3], "living_room", BatchOptions::default())
            .await;
        assert!(matches!(
            result,
            Err(BatchError::Compositor(CompositorError::ArtworkDecode(_)))
        ));

        std::fs::remove_dir_all(&dir).ok();
    }
}
