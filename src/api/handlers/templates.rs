//! Template management endpoints

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::handlers::{
    authoring_error_response, bad_request, param_error_response, store_error_response,
    upload_error_response,
};
use crate::api::multipart::{self, UploadForm};
use crate::domain::{
    GeometryError, PlacementGeometry, Point, Region, RenderParams, SourceFormat,
    TemplateDescriptor,
};
use crate::engine::layered::LayeredDocument;
use crate::engine::{create_template, AuthoringRequest};
use crate::AppState;

/// Response for listing templates
#[derive(Serialize, ToSchema)]
pub struct TemplatesListResponse {
    pub success: bool,
    pub data: Vec<TemplateDescriptor>,
    pub count: usize,
}

/// Response for a single template
#[derive(Serialize, ToSchema)]
pub struct TemplateResponse {
    pub success: bool,
    pub data: TemplateDescriptor,
}

/// Geometry summary returned after authoring, for caller-side preview
#[derive(Serialize, ToSchema)]
pub struct ManifestSummary {
    pub width: u32,
    pub height: u32,
    pub corners: Option<[Point; 4]>,
    pub background: String,
}

/// Response after creating or registering a template
#[derive(Serialize, ToSchema)]
pub struct TemplateCreatedResponse {
    pub success: bool,
    pub room: String,
    pub template_id: String,
    pub manifest: ManifestSummary,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub room: Option<String>,
}

fn manifest_summary(descriptor: &TemplateDescriptor) -> ManifestSummary {
    let corners = match &descriptor.geometry {
        PlacementGeometry::Quadrilateral { corners } => Some(*corners),
        PlacementGeometry::Region(region) => Some(region.corners()),
    };
    ManifestSummary {
        width: descriptor.width,
        height: descriptor.height,
        corners,
        background: descriptor.background.clone(),
    }
}

fn comma_tags(form: &UploadForm) -> Vec<String> {
    form.field("tags")
        .map(|tags| {
            tags.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// GET /api/v1/templates - List templates, optionally filtered by room
#[utoipa::path(
    get,
    path = "/api/v1/templates",
    tag = "templates",
    params(("room" = Option<String>, Query, description = "Filter by room category")),
    responses(
        (status = 200, description = "List of templates", body = TemplatesListResponse)
    )
)]
pub async fn list_templates(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let templates = state.store.list(query.room.as_deref());
    let data: Vec<TemplateDescriptor> = templates.iter().map(|t| t.as_ref().clone()).collect();
    let count = data.len();

    info!(count, room = ?query.room, "Retrieved templates list");

    HttpResponse::Ok().json(TemplatesListResponse {
        success: true,
        data,
        count,
    })
}

/// GET /api/v1/templates/{room}/{template_id} - Get a single template
#[utoipa::path(
    get,
    path = "/api/v1/templates/{room}/{template_id}",
    tag = "templates",
    params(
        ("room" = String, Path, description = "Room category"),
        ("template_id" = String, Path, description = "Template identifier")
    ),
    responses(
        (status = 200, description = "Template details", body = TemplateResponse),
        (status = 404, description = "Template not found", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn get_template(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (room, template_id) = path.into_inner();

    match state.store.get(&room, &template_id) {
        Ok(descriptor) => HttpResponse::Ok().json(TemplateResponse {
            success: true,
            data: descriptor.as_ref().clone(),
        }),
        Err(e) => store_error_response(&e),
    }
}

/// POST /api/v1/templates/create - Author a template from background + mask
///
/// Multipart: `background` (file), `mask` (file, white = placement area),
/// `room`, optional `templateId`/`name`/`description`/`tags` (comma
/// separated), `blendMode`/`blendOpacity`/`featherPx`/`padInsetPx`,
/// `overwrite` flag.
#[utoipa::path(
    post,
    path = "/api/v1/templates/create",
    tag = "templates",
    responses(
        (status = 200, description = "Template created", body = TemplateCreatedResponse),
        (status = 400, description = "Invalid input", body = crate::api::handlers::ErrorResponse),
        (status = 409, description = "Template already exists", body = crate::api::handlers::ErrorResponse),
        (status = 422, description = "Mask produced unusable geometry", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn create_template_handler(
    state: web::Data<AppState>,
    payload: Multipart,
) -> HttpResponse {
    let form = match multipart::collect(payload).await {
        Ok(form) => form,
        Err(e) => return upload_error_response(&e),
    };

    let room = match form.field("room") {
        Some(room) => room.to_string(),
        None => return bad_request("INVALID_UPLOAD", "Field 'room' is required".to_string()),
    };
    let background = match form.file("background") {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return upload_error_response(&e),
    };
    let mask = match form.file("mask") {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return upload_error_response(&e),
    };

    let render = match RenderParams::from_form_fields(
        form.field("blendMode"),
        form.field("blendOpacity"),
        form.field("featherPx"),
        form.field("padInsetPx"),
    ) {
        Ok(render) => render,
        Err(e) => return param_error_response(&e),
    };

    let request = AuthoringRequest {
        room: room.clone(),
        template_id: form.field("templateId").map(|s| s.to_string()),
        display_name: form.field("name").map(|s| s.to_string()),
        description: form.field("description").map(|s| s.to_string()),
        tags: comma_tags(&form),
        render,
        overwrite: form.flag("overwrite"),
    };

    match create_template(&state.store, background, mask, request).await {
        Ok(descriptor) => HttpResponse::Ok().json(TemplateCreatedResponse {
            success: true,
            room: descriptor.room.clone(),
            template_id: descriptor.id.clone(),
            manifest: manifest_summary(&descriptor),
        }),
        Err(e) => {
            error!(room = %room, error = %e, "Template create failed");
            authoring_error_response(&e)
        }
    }
}

/// POST /api/v1/templates/register-layered - Register a PSD template
///
/// Multipart: `design_file` (PSD), `room`, optional `templateId`/`name`/
/// `description`/`tags`/`layer_name`/`overwrite`. The placeholder layer must
/// resolve before anything is persisted.
#[utoipa::path(
    post,
    path = "/api/v1/templates/register-layered",
    tag = "templates",
    responses(
        (status = 200, description = "Layered template registered", body = TemplateCreatedResponse),
        (status = 400, description = "Invalid input", body = crate::api::handlers::ErrorResponse),
        (status = 422, description = "Placeholder layer not found", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn register_layered(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let form = match multipart::collect(payload).await {
        Ok(form) => form,
        Err(e) => return upload_error_response(&e),
    };

    let room = match form.field("room") {
        Some(room) => room.to_string(),
        None => return bad_request("INVALID_UPLOAD", "Field 'room' is required".to_string()),
    };
    let design_bytes = match form.file("design_file") {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return upload_error_response(&e),
    };
    let layer_name = form.field("layer_name").map(|s| s.to_string());

    // Fail fast: placeholder geometry must resolve before any write
    let candidates = state.settings.render.placeholder_layers.clone();
    let parse_bytes = design_bytes.clone();
    let parse_layer_name = layer_name.clone();
    let parsed = web::block(move || {
        let document = LayeredDocument::parse(&parse_bytes)?;
        let region = document
            .find_placeholder(parse_layer_name.as_deref(), &candidates)
            .ok_or_else(|| {
                crate::store::StoreError::Geometry(GeometryError::PlaceholderNotFound(format!(
                    "available layers: {:?}",
                    document.layer_names()
                )))
            })?;
        if region.width <= 0 || region.height <= 0 {
            return Err(GeometryError::Degenerate(region.width as f32, region.height as f32).into());
        }

        // Full preview render doubles as the stored background asset
        let preview = document.render()?;
        let mut preview_bytes = Vec::new();
        image::DynamicImage::ImageRgba8(preview)
            .write_to(
                &mut std::io::Cursor::new(&mut preview_bytes),
                image::ImageFormat::Png,
            )
            .map_err(crate::store::StoreError::ImageLoad)?;

        Ok::<_, crate::store::StoreError>((
            document.width(),
            document.height(),
            region,
            preview_bytes,
        ))
    })
    .await;

    let (width, height, region, preview_bytes) = match parsed {
        Ok(Ok(parsed)) => parsed,
        Ok(Err(e)) => return store_error_response(&e),
        Err(e) => {
            error!(error = %e, "PSD parse worker failed");
            return bad_request("INVALID_UPLOAD", e.to_string());
        }
    };

    let id = form
        .field("templateId")
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("tpl-{}", &Uuid::new_v4().simple().to_string()[..8]));

    let descriptor = TemplateDescriptor {
        id: id.clone(),
        room: room.clone(),
        display_name: form
            .field("name")
            .map(|s| s.to_string())
            .unwrap_or_else(|| id.clone()),
        description: form.field("description").map(|s| s.to_string()),
        tags: comma_tags(&form),
        width,
        height,
        background: "background.png".to_string(),
        // Registration-time rectangle, kept for preview; the live PSD is
        // authoritative at render time.
        geometry: PlacementGeometry::Region(Region::new(
            region.left as f32,
            region.top as f32,
            region.width as f32,
            region.height as f32,
        )),
        source: SourceFormat::Layered {
            file: "scene.psd".to_string(),
            layer_name,
        },
        render: RenderParams::default(),
        created_at: Utc::now(),
    };

    let saved: Arc<TemplateDescriptor> = match state
        .store
        .save(descriptor, preview_bytes, Some(design_bytes), form.flag("overwrite"))
        .await
    {
        Ok(saved) => saved,
        Err(e) => return store_error_response(&e),
    };

    info!(
        room = %saved.room,
        template_id = %saved.id,
        placeholder = %region.layer_name,
        from_frame = region.from_frame,
        "Layered template registered"
    );

    HttpResponse::Ok().json(TemplateCreatedResponse {
        success: true,
        room: saved.room.clone(),
        template_id: saved.id.clone(),
        manifest: manifest_summary(&saved),
    })
}

/// DELETE /api/v1/templates/{room}/{template_id} - Delete a template and its
/// stored assets (asset files first, manifest last).
#[utoipa::path(
    delete,
    path = "/api/v1/templates/{room}/{template_id}",
    tag = "templates",
    params(
        ("room" = String, Path, description = "Room category"),
        ("template_id" = String, Path, description = "Template identifier")
    ),
    responses(
        (status = 200, description = "Template deleted"),
        (status = 404, description = "Template not found", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn delete_template(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> HttpResponse {
    let (room, template_id) = path.into_inner();

    match state.store.delete(&room, &template_id).await {
        Ok(()) => {
            info!(room = %room, template_id = %template_id, "Template deleted via API");
            HttpResponse::Ok().json(serde_json::json!({ "success": true }))
        }
        Err(e) => {
            error!(room = %room, template_id = %template_id, error = %e, "Template delete failed");
            store_error_response(&e)
        }
    }
}
