//! Health check endpoint

use actix_web::{web, HttpResponse};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;
use utoipa::ToSchema;

use crate::AppState;

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Record process start; called once from main before serving
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub templates_loaded: usize,
    pub rooms: Vec<String>,
}

/// GET /health - Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let response = HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: STARTED_AT.elapsed().as_secs(),
        templates_loaded: state.store.template_count(),
        rooms: state.store.rooms(),
    };

    HttpResponse::Ok().json(response)
}
