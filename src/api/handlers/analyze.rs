//! PSD analysis endpoint for template authors

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::api::handlers::{bad_request, upload_error_response};
use crate::api::multipart;
use crate::engine::layered::{LayerNode, LayeredDocument};
use crate::AppState;

#[derive(Serialize, ToSchema)]
pub struct PlaceholderSummary {
    pub layer_name: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// Bounds came from a `frame` layer rather than the placeholder itself
    pub from_frame: bool,
}

#[derive(Serialize, ToSchema)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LayerNode>,
    /// The placeholder region the store would resolve, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<PlaceholderSummary>,
}

/// POST /api/v1/templates/analyze - Inspect a PSD's layer tree
///
/// Lets admins check layer names and bounds before registering a layered
/// template. Multipart: `design_file`, optional `layer_name`.
#[utoipa::path(
    post,
    path = "/api/v1/templates/analyze",
    tag = "templates",
    responses(
        (status = 200, description = "Layer tree and placeholder resolution", body = AnalyzeResponse),
        (status = 400, description = "Invalid input", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn analyze_design_file(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let form = match multipart::collect(payload).await {
        Ok(form) => form,
        Err(e) => return upload_error_response(&e),
    };

    let design_bytes = match form.file("design_file") {
        Ok(bytes) => bytes.to_vec(),
        Err(e) => return upload_error_response(&e),
    };
    let layer_name = form.field("layer_name").map(|s| s.to_string());
    let candidates = state.settings.render.placeholder_layers.clone();

    let analysis = web::block(move || {
        let document = LayeredDocument::parse(&design_bytes)?;
        let placeholder = document
            .find_placeholder(layer_name.as_deref(), &candidates)
            .map(|region| PlaceholderSummary {
                layer_name: region.layer_name,
                left: region.left,
                top: region.top,
                width: region.width,
                height: region.height,
                from_frame: region.from_frame,
            });
        Ok::<_, crate::engine::layered::LayeredError>((
            document.width(),
            document.height(),
            document.tree(),
            placeholder,
        ))
    })
    .await;

    match analysis {
        Ok(Ok((width, height, layers, placeholder))) => {
            info!(width, height, layers = layers.len(), "Analyzed design file");
            HttpResponse::Ok().json(AnalyzeResponse {
                success: true,
                width,
                height,
                layers,
                placeholder,
            })
        }
        Ok(Err(e)) => bad_request("DESIGN_FILE_PARSE_FAILED", e.to_string()),
        Err(e) => bad_request("DESIGN_FILE_PARSE_FAILED", e.to_string()),
    }
}
