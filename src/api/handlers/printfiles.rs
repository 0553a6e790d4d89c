//! Print-file size variants endpoint

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;
use utoipa::ToSchema;

use crate::api::handlers::{compositor_error_response, upload_error_response};
use crate::api::multipart;
use crate::engine::formats;
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct PrintFileEntry {
    pub width: u32,
    pub height: u32,
    /// Data-URL encoded JPEG at 300 DPI
    pub image_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct PrintFilesResponse {
    pub success: bool,
    pub formats: BTreeMap<String, PrintFileEntry>,
}

/// POST /api/v1/artwork/print-files - Resize artwork into every shop print
/// format. Formats that fail to encode are omitted rather than failing the
/// request.
#[utoipa::path(
    post,
    path = "/api/v1/artwork/print-files",
    tag = "artwork",
    responses(
        (status = 200, description = "Print-ready variants", body = PrintFilesResponse),
        (status = 400, description = "Invalid input", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn print_files(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let form = match multipart::collect(payload).await {
        Ok(form) => form,
        Err(e) => return upload_error_response(&e),
    };

    let artwork = match super::generate::artwork_bytes(state.get_ref(), &form).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    let compositor = state.compositor.clone();
    let quality = state.settings.render.jpeg_quality.max(95);
    let variants = match web::block(move || {
        let decoded = compositor.decode_artwork(&artwork)?;
        Ok::<_, crate::engine::CompositorError>(formats::resize_to_formats(&decoded, quality))
    })
    .await
    {
        Ok(Ok(variants)) => variants,
        Ok(Err(e)) => return compositor_error_response(&e),
        Err(e) => {
            return crate::api::handlers::error_response(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "COMPOSITING_FAILED",
                e.to_string(),
            )
        }
    };

    info!(count = variants.len(), "Generated print-file variants");

    let formats: BTreeMap<String, PrintFileEntry> = variants
        .into_iter()
        .map(|v| {
            (
                v.format.to_string(),
                PrintFileEntry {
                    width: v.width,
                    height: v.height,
                    image_url: format!(
                        "data:image/jpeg;base64,{}",
                        base64::engine::general_purpose::STANDARD.encode(&v.bytes)
                    ),
                },
            )
        })
        .collect();

    HttpResponse::Ok().json(PrintFilesResponse {
        success: true,
        formats,
    })
}
