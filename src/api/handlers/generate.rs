//! Single-mockup generation endpoint

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use base64::Engine;
use bytes::Bytes;
use serde::Serialize;
use std::str::FromStr;
use std::time::Instant;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::api::handlers::{
    bad_request, compositor_error_response, param_error_response, store_error_response,
    upload_error_response,
};
use crate::api::multipart::{self, UploadForm};
use crate::domain::{BlendMode, FitMode, ParamError, RenderOverrides};
use crate::engine::{CompositeOptions, CompositeResult, CompositorError};
use crate::store::StoreError;
use crate::AppState;

/// Response for successful mockup generation (JSON mode)
#[derive(Serialize, ToSchema)]
pub struct GenerateResponse {
    pub success: bool,
    /// Data-URL encoded JPEG
    pub mockup_url: String,
    pub metadata: GenerateMetadata,
}

/// Metadata about the generation
#[derive(Serialize, ToSchema)]
pub struct GenerateMetadata {
    pub generation_time_ms: u64,
    pub template_used: String,
    pub dimensions: Dimensions,
    pub dpi: u16,
}

#[derive(Serialize, ToSchema)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Failures inside the blocking composite closure
pub(crate) enum GenerateFailure {
    Store(StoreError),
    Compositor(CompositorError),
    Params(ParamError),
}

impl GenerateFailure {
    pub(crate) fn into_response(self) -> HttpResponse {
        match self {
            GenerateFailure::Store(e) => store_error_response(&e),
            GenerateFailure::Compositor(e) => compositor_error_response(&e),
            GenerateFailure::Params(e) => param_error_response(&e),
        }
    }
}

/// Parse per-call render overrides from multipart text fields.
/// Absent fields defer to the template manifest.
pub(crate) fn parse_render_options(
    form: &UploadForm,
) -> Result<(RenderOverrides, FitMode, bool), ParamError> {
    let mut overrides = RenderOverrides::default();

    if let Some(mode) = form.field("blend_mode") {
        overrides.blend_mode = Some(BlendMode::from_str(mode)?);
    }
    if let Some(raw) = form.field("opacity") {
        let value: f32 = raw.parse().map_err(|_| ParamError::Malformed {
            field: "opacity",
            expected: "number",
            value: raw.to_string(),
        })?;
        if !(0.0..=1.0).contains(&value) {
            return Err(ParamError::InvalidOpacity(value));
        }
        overrides.opacity = Some(value);
    }
    if let Some(raw) = form.field("feather_px") {
        overrides.feather_px = Some(raw.parse().map_err(|_| ParamError::Malformed {
            field: "feather_px",
            expected: "non-negative integer",
            value: raw.to_string(),
        })?);
    }
    if let Some(raw) = form.field("pad_inset_px") {
        overrides.pad_inset_px = Some(raw.parse().map_err(|_| ParamError::Malformed {
            field: "pad_inset_px",
            expected: "non-negative integer",
            value: raw.to_string(),
        })?);
    }

    let fit = match form.field("fit") {
        Some(raw) => FitMode::from_str(raw)?,
        None => FitMode::Contain,
    };

    Ok((overrides, fit, form.flag("knockout_white")))
}

/// Resolve artwork bytes: uploaded file part first, remote URL second.
pub(crate) async fn artwork_bytes(
    state: &AppState,
    form: &UploadForm,
) -> Result<Bytes, HttpResponse> {
    if let Some(bytes) = form.files.get("artwork") {
        return Ok(bytes.clone());
    }
    if let Some(url) = form.field("artwork_url") {
        return state
            .compositor
            .fetch_artwork(url)
            .await
            .map_err(|e| compositor_error_response(&e));
    }
    Err(bad_request(
        "INVALID_UPLOAD",
        "Provide an 'artwork' file or an 'artwork_url' field".to_string(),
    ))
}

/// POST /api/v1/mockups/generate - Composite artwork into one template
///
/// Multipart fields: `artwork` (file) or `artwork_url`, `room`,
/// `template_id`, optional `blend_mode`/`opacity`/`feather_px`/
/// `pad_inset_px`/`fit`/`knockout_white`, `return_format` (`image`|`json`).
#[utoipa::path(
    post,
    path = "/api/v1/mockups/generate",
    tag = "mockups",
    responses(
        (status = 200, description = "Mockup generated (JPEG bytes or JSON per return_format)", body = GenerateResponse),
        (status = 400, description = "Invalid input", body = crate::api::handlers::ErrorResponse),
        (status = 404, description = "Template not found", body = crate::api::handlers::ErrorResponse),
        (status = 500, description = "Generation failed", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn generate_mockup(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let start = Instant::now();

    let form = match multipart::collect(payload).await {
        Ok(form) => form,
        Err(e) => return upload_error_response(&e),
    };

    let (room, template_id) = match (form.field("room"), form.field("template_id")) {
        (Some(room), Some(id)) => (room.to_string(), id.to_string()),
        _ => {
            return bad_request(
                "INVALID_UPLOAD",
                "Fields 'room' and 'template_id' are required".to_string(),
            )
        }
    };

    let (overrides, fit, knockout_white) = match parse_render_options(&form) {
        Ok(parsed) => parsed,
        Err(e) => return param_error_response(&e),
    };

    let descriptor = match state.store.get(&room, &template_id) {
        Ok(d) => d,
        Err(e) => return store_error_response(&e),
    };

    let artwork = match artwork_bytes(state.get_ref(), &form).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    info!(
        room = %room,
        template_id = %template_id,
        artwork_bytes = artwork.len(),
        "Processing mockup generation request"
    );

    let store = state.store.clone();
    let compositor = state.compositor.clone();
    let result = web::block(move || -> Result<CompositeResult, GenerateFailure> {
        let artwork = compositor
            .decode_artwork(&artwork)
            .map_err(GenerateFailure::Compositor)?;
        let scene = store
            .resolve_scene(&descriptor)
            .map_err(GenerateFailure::Store)?;

        let options = CompositeOptions {
            params: overrides.apply_to(scene.render),
            fit,
            knockout_white,
        };
        options.params.validate().map_err(GenerateFailure::Params)?;

        compositor
            .composite(
                &descriptor.id,
                &artwork,
                &scene.geometry,
                &scene.background,
                &options,
            )
            .map_err(GenerateFailure::Compositor)
    })
    .await;

    let result = match result {
        Ok(Ok(result)) => result,
        Ok(Err(failure)) => return failure.into_response(),
        Err(e) => {
            error!(error = %e, "Composite worker failed");
            return crate::api::handlers::error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "COMPOSITING_FAILED",
                e.to_string(),
            );
        }
    };

    let elapsed = start.elapsed().as_millis() as u64;
    info!(
        room = %room,
        template_id = %template_id,
        generation_time_ms = elapsed,
        "Mockup generated successfully"
    );

    if form.field("return_format") == Some("json") {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&result.bytes);
        return HttpResponse::Ok().json(GenerateResponse {
            success: true,
            mockup_url: format!("data:image/jpeg;base64,{}", encoded),
            metadata: GenerateMetadata {
                generation_time_ms: elapsed,
                template_used: result.template_id,
                dimensions: Dimensions {
                    width: result.width,
                    height: result.height,
                },
                dpi: result.dpi,
            },
        });
    }

    HttpResponse::Ok()
        .content_type("image/jpeg")
        .insert_header(("X-Template-Id", result.template_id.clone()))
        .body(result.bytes)
}
