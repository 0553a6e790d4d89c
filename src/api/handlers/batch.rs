//! Room-batch mockup endpoint

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::info;
use utoipa::ToSchema;

use crate::api::handlers::{
    bad_request, batch_error_response, param_error_response, upload_error_response,
};
use crate::api::multipart;
use crate::engine::{BatchOptions, TemplateOutcome};
use crate::AppState;

use super::generate::{artwork_bytes, parse_render_options};

/// One slot of a batch response
#[derive(Serialize, ToSchema)]
pub struct BatchSlot {
    /// "success", "degraded", or "failed"
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mockup_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Response for a batch run
#[derive(Serialize, ToSchema)]
pub struct BatchResponse {
    pub success: bool,
    pub room: String,
    pub total: usize,
    pub succeeded: usize,
    pub results: BTreeMap<String, BatchSlot>,
    pub generation_time_ms: u64,
}

fn slot(outcome: TemplateOutcome) -> BatchSlot {
    let encode = |bytes: &bytes::Bytes| {
        format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )
    };
    match outcome {
        TemplateOutcome::Success(result) => BatchSlot {
            status: "success",
            mockup_url: Some(encode(&result.bytes)),
            width: Some(result.width),
            height: Some(result.height),
            reason: None,
        },
        TemplateOutcome::Degraded { result, reason } => BatchSlot {
            status: "degraded",
            mockup_url: Some(encode(&result.bytes)),
            width: Some(result.width),
            height: Some(result.height),
            reason: Some(reason),
        },
        TemplateOutcome::Failed { reason } => BatchSlot {
            status: "failed",
            mockup_url: None,
            width: None,
            height: None,
            reason: Some(reason),
        },
    }
}

/// POST /api/v1/mockups/batch - Composite artwork against every template in
/// a room. Partial failure is a normal terminal state: the response always
/// carries one slot per template.
#[utoipa::path(
    post,
    path = "/api/v1/mockups/batch",
    tag = "mockups",
    responses(
        (status = 200, description = "Batch finished (possibly with degraded slots)", body = BatchResponse),
        (status = 400, description = "Invalid input", body = crate::api::handlers::ErrorResponse),
        (status = 404, description = "Room has no templates", body = crate::api::handlers::ErrorResponse)
    )
)]
pub async fn generate_batch(state: web::Data<AppState>, payload: Multipart) -> HttpResponse {
    let start = Instant::now();

    let form = match multipart::collect(payload).await {
        Ok(form) => form,
        Err(e) => return upload_error_response(&e),
    };

    let room = match form.field("room") {
        Some(room) => room.to_string(),
        None => return bad_request("INVALID_UPLOAD", "Field 'room' is required".to_string()),
    };

    let (overrides, fit, knockout_white) = match parse_render_options(&form) {
        Ok(parsed) => parsed,
        Err(e) => return param_error_response(&e),
    };

    let artwork = match artwork_bytes(state.get_ref(), &form).await {
        Ok(bytes) => bytes,
        Err(response) => return response,
    };

    let options = BatchOptions {
        overrides,
        fit,
        knockout_white,
    };

    let result = match state.batch.generate_for_room(&artwork, &room, options).await {
        Ok(result) => result,
        Err(e) => return batch_error_response(&e),
    };

    let elapsed = start.elapsed().as_millis() as u64;
    let total = result.outcomes.len();
    let succeeded = result.success_count();

    info!(
        room = %room,
        total,
        succeeded,
        generation_time_ms = elapsed,
        "Batch request finished"
    );

    let results: BTreeMap<String, BatchSlot> = result
        .outcomes
        .into_iter()
        .map(|(id, outcome)| (id, slot(outcome)))
        .collect();

    HttpResponse::Ok().json(BatchResponse {
        success: true,
        room: result.room,
        total,
        succeeded,
        results,
        generation_time_ms: elapsed,
    })
}
