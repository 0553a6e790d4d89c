//! Template store: descriptors, assets, and scene resolution
//!
//! Templates live on disk under `{root}/{room}/{template_id}/` as a
//! `manifest.json` plus the background raster (and the PSD for layered
//! templates). Descriptors are cached process-wide; templates only mutate
//! through explicit authoring and deletion, which invalidate the cache.
//!
//! Deletion removes asset files first and the manifest last, so a failed
//! asset delete can never leave a manifest pointing at missing bytes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::DynamicImage;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::geometry::{self, GeometryError};
use crate::domain::{
    PlacementGeometry, Region, RenderParams, ResolvedGeometry, SourceFormat, TemplateDescriptor,
};
use crate::engine::layered::{LayeredDocument, LayeredError};

/// Template store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Template not found: {0}/{1}")]
    NotFound(String, String),
    #[error("Template already exists: {0}/{1}")]
    AlreadyExists(String, String),
    #[error("No templates registered for room: {0}")]
    RoomEmpty(String),
    #[error("Failed to load template image: {0}")]
    ImageLoad(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Layered(#[from] LayeredError),
    #[error("Invalid template descriptor: {0}")]
    Invalid(String),
}

/// Default placeholder layer names tried, in order, when a layered template
/// does not pin one explicitly.
pub const DEFAULT_PLACEHOLDER_CANDIDATES: [&str; 5] = [
    "Your Design Here",
    "Add Design Here",
    "Place Your Design Here",
    "Design",
    "Artwork",
];

const MANIFEST_FILE: &str = "manifest.json";

/// A template readied for compositing: background pixels plus resolved
/// geometry and the manifest's render parameters.
#[derive(Debug)]
pub struct ResolvedScene {
    pub background: DynamicImage,
    pub geometry: ResolvedGeometry,
    pub render: RenderParams,
}

/// Manages template descriptors and their on-disk assets
pub struct TemplateStore {
    root: PathBuf,
    placeholder_candidates: Vec<String>,
    cache: RwLock<HashMap<String, Arc<TemplateDescriptor>>>,
}

impl TemplateStore {
    pub fn new(root: &Path, placeholder_candidates: Vec<String>) -> Self {
        let candidates = if placeholder_candidates.is_empty() {
            DEFAULT_PLACEHOLDER_CANDIDATES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            placeholder_candidates
        };
        TemplateStore {
            root: root.to_path_buf(),
            placeholder_candidates: candidates,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scan the template root and load every manifest into the cache.
    /// Unreadable templates are skipped with a warning, not fatal.
    pub async fn load_all(&self) -> Result<(), StoreError> {
        let root = self.root.clone();

        let loaded = tokio::task::spawn_blocking(move || {
            let mut loaded = HashMap::new();

            if !root.exists() {
                warn!("Template root does not exist: {}", root.display());
                return Ok(loaded);
            }

            for room_entry in std::fs::read_dir(&root)? {
                let room_dir = room_entry?.path();
                if !room_dir.is_dir() {
                    continue;
                }
                for tpl_entry in std::fs::read_dir(&room_dir)? {
                    let tpl_dir = tpl_entry?.path();
                    let manifest = tpl_dir.join(MANIFEST_FILE);
                    if !manifest.exists() {
                        continue;
                    }
                    match read_manifest(&manifest) {
                        Ok(descriptor) => {
                            loaded.insert(
                                cache_key(&descriptor.room, &descriptor.id),
                                Arc::new(descriptor),
                            );
                        }
                        Err(e) => {
                            warn!(
                                path = %tpl_dir.display(),
                                error = %e,
                                "Failed to load template"
                            );
                        }
                    }
                }
            }

            Ok::<_, StoreError>(loaded)
        })
        .await
        .map_err(|e| StoreError::Invalid(format!("Task join error: {}", e)))??;

        info!(count = loaded.len(), "Loaded template manifests");

        let mut guard = self.cache.write();
        *guard = loaded;
        Ok(())
    }

    /// Get a descriptor by room and id. Falls back to a disk read so
    /// templates dropped in place after startup are still found.
    pub fn get(&self, room: &str, id: &str) -> Result<Arc<TemplateDescriptor>, StoreError> {
        validate_key_component(room)?;
        validate_key_component(id)?;

        if let Some(descriptor) = self.cache.read().get(&cache_key(room, id)).cloned() {
            return Ok(descriptor);
        }

        let manifest = self.template_dir(room, id).join(MANIFEST_FILE);
        if !manifest.exists() {
            return Err(StoreError::NotFound(room.to_string(), id.to_string()));
        }
        let descriptor = Arc::new(read_manifest(&manifest)?);
        self.cache
            .write()
            .insert(cache_key(room, id), descriptor.clone());
        Ok(descriptor)
    }

    /// List descriptors, optionally scoped to one room
    pub fn list(&self, room: Option<&str>) -> Vec<Arc<TemplateDescriptor>> {
        let guard = self.cache.read();
        let mut templates: Vec<_> = guard
            .values()
            .filter(|d| room.map_or(true, |r| d.room == r))
            .cloned()
            .collect();
        templates.sort_by(|a, b| (&a.room, &a.id).cmp(&(&b.room, &b.id)));
        templates
    }

    /// Rooms that currently have at least one template
    pub fn rooms(&self) -> Vec<String> {
        let guard = self.cache.read();
        let mut rooms: Vec<String> = guard.values().map(|d| d.room.clone()).collect();
        rooms.sort();
        rooms.dedup();
        rooms
    }

    pub fn template_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Persist a new template: assets first, manifest last, cache updated
    /// only once everything is on disk.
    pub async fn save(
        &self,
        descriptor: TemplateDescriptor,
        background_bytes: Vec<u8>,
        design_file_bytes: Option<Vec<u8>>,
        overwrite: bool,
    ) -> Result<Arc<TemplateDescriptor>, StoreError> {
        validate_key_component(&descriptor.room)?;
        validate_key_component(&descriptor.id)?;

        let dir = self.template_dir(&descriptor.room, &descriptor.id);
        let exists = self.cache.read().contains_key(&cache_key(&descriptor.room, &descriptor.id))
            || dir.join(MANIFEST_FILE).exists();
        if exists && !overwrite {
            return Err(StoreError::AlreadyExists(
                descriptor.room.clone(),
                descriptor.id.clone(),
            ));
        }

        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&descriptor.background), &background_bytes).await?;
        if let Some(psd_bytes) = design_file_bytes {
            if let SourceFormat::Layered { file, .. } = &descriptor.source {
                tokio::fs::write(dir.join(file), &psd_bytes).await?;
            }
        }

        let manifest = serde_json::to_vec_pretty(&descriptor)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), manifest).await?;

        let descriptor = Arc::new(descriptor);
        self.cache.write().insert(
            cache_key(&descriptor.room, &descriptor.id),
            descriptor.clone(),
        );

        info!(
            room = %descriptor.room,
            template_id = %descriptor.id,
            overwrite = overwrite && exists,
            "Template saved"
        );
        Ok(descriptor)
    }

    /// Delete a template: asset files first, the manifest last, then the
    /// (now empty) directory. Cache is invalidated up front so readers stop
    /// seeing the template even if a file removal fails midway.
    pub async fn delete(&self, room: &str, id: &str) -> Result<(), StoreError> {
        let descriptor = self.get(room, id)?;
        self.cache.write().remove(&cache_key(room, id));

        let dir = self.template_dir(room, id);
        let manifest = dir.join(MANIFEST_FILE);

        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == manifest {
                continue;
            }
            tokio::fs::remove_file(&path).await?;
        }
        tokio::fs::remove_file(&manifest).await?;
        if let Err(e) = tokio::fs::remove_dir(&dir).await {
            debug!(error = %e, "Template directory not removed");
        }

        info!(room = %room, template_id = %descriptor.id, "Template deleted");
        Ok(())
    }

    /// Resolve a descriptor into background pixels + compositor geometry.
    ///
    /// Blocking (decodes rasters, parses PSDs); call from a blocking task.
    pub fn resolve_scene(&self, descriptor: &TemplateDescriptor) -> Result<ResolvedScene, StoreError> {
        match &descriptor.source {
            SourceFormat::Manifest => {
                let background = image::open(self.background_path(descriptor))?;
                let geometry = geometry::resolve(&descriptor.geometry)?;
                Ok(ResolvedScene {
                    background,
                    geometry,
                    render: descriptor.render,
                })
            }
            SourceFormat::Layered { file, layer_name } => {
                // Layered templates only support axis-aligned placement; the
                // live design file is authoritative over cached geometry.
                if matches!(descriptor.geometry, PlacementGeometry::Quadrilateral { .. }) {
                    return Err(GeometryError::UnsupportedWarp("layered-placeholder".into()).into());
                }

                let path = self.template_dir(&descriptor.room, &descriptor.id).join(file);
                let bytes = std::fs::read(&path)?;
                let document = LayeredDocument::parse(&bytes)?;

                let region = document
                    .find_placeholder(layer_name.as_deref(), &self.placeholder_candidates)
                    .ok_or_else(|| {
                        GeometryError::PlaceholderNotFound(format!(
                            "{:?} (available: {:?})",
                            layer_name
                                .clone()
                                .map(|n| vec![n])
                                .unwrap_or_else(|| self.placeholder_candidates.clone()),
                            document.layer_names()
                        ))
                    })?;
                if region.width <= 0 || region.height <= 0 {
                    return Err(
                        GeometryError::Degenerate(region.width as f32, region.height as f32).into(),
                    );
                }

                debug!(
                    room = %descriptor.room,
                    template_id = %descriptor.id,
                    layer = %region.layer_name,
                    from_frame = region.from_frame,
                    "Resolved placeholder region"
                );

                // Render with the placeholder excluded so its preview pixels
                // never leak through the artwork.
                let background = document.render_excluding(&[region.layer_name.clone()])?;

                Ok(ResolvedScene {
                    background: DynamicImage::ImageRgba8(background),
                    geometry: ResolvedGeometry::Rect {
                        region: Region::new(
                            region.left as f32,
                            region.top as f32,
                            region.width as f32,
                            region.height as f32,
                        ),
                        blank_backdrop: true,
                    },
                    render: descriptor.render,
                })
            }
        }
    }

    pub fn template_dir(&self, room: &str, id: &str) -> PathBuf {
        self.root.join(room).join(id)
    }

    pub fn background_path(&self, descriptor: &TemplateDescriptor) -> PathBuf {
        self.template_dir(&descriptor.room, &descriptor.id)
            .join(&descriptor.background)
    }
}

fn cache_key(room: &str, id: &str) -> String {
    format!("{}/{}", room, id)
}

fn read_manifest(path: &Path) -> Result<TemplateDescriptor, StoreError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Room/template ids become path components; keep them boring.
fn validate_key_component(value: &str) -> Result<(), StoreError> {
    let ok = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!(
            "'{}' is not a valid room/template identifier",
            value
        )))
    }
}
