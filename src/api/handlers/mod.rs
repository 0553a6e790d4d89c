//! HTTP request handlers

pub mod analyze;
pub mod batch;
pub mod generate;
pub mod health;
pub mod printfiles;
pub mod templates;

use actix_web::HttpResponse;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::multipart::UploadError;
use crate::domain::{GeometryError, ParamError};
use crate::engine::{AuthoringError, BatchError, CompositorError};
use crate::store::StoreError;

/// Error envelope shared by every endpoint
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ApiError,
}

#[derive(Serialize, ToSchema)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Build the standard error envelope response
pub fn error_response(status: actix_web::http::StatusCode, code: &str, message: String) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse {
        success: false,
        error: ApiError {
            code: code.to_string(),
            message,
        },
    })
}

pub fn bad_request(code: &str, message: String) -> HttpResponse {
    error_response(actix_web::http::StatusCode::BAD_REQUEST, code, message)
}

/// Map store errors onto status + code the way callers expect them
pub fn store_error_response(err: &StoreError) -> HttpResponse {
    use actix_web::http::StatusCode;
    match err {
        StoreError::NotFound(room, id) => error_response(
            StatusCode::NOT_FOUND,
            "TEMPLATE_NOT_FOUND",
            format!("Template '{}/{}' does not exist", room, id),
        ),
        StoreError::AlreadyExists(room, id) => error_response(
            StatusCode::CONFLICT,
            "TEMPLATE_EXISTS",
            format!("Template '{}/{}' already exists (set overwrite=true to replace)", room, id),
        ),
        StoreError::RoomEmpty(room) => error_response(
            StatusCode::NOT_FOUND,
            "ROOM_EMPTY",
            format!("No templates registered for room '{}'", room),
        ),
        StoreError::Invalid(msg) => {
            bad_request("INVALID_TEMPLATE", msg.clone())
        }
        StoreError::Geometry(e) => geometry_error_response(e),
        other => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "TEMPLATE_LOAD_FAILED",
            other.to_string(),
        ),
    }
}

pub fn geometry_error_response(err: &GeometryError) -> HttpResponse {
    use actix_web::http::StatusCode;
    let code = match err {
        GeometryError::PlaceholderNotFound(_) => "GEOMETRY_NOT_FOUND",
        GeometryError::Degenerate(_, _) => "DEGENERATE_GEOMETRY",
        GeometryError::UnsupportedWarp(_) => "UNSUPPORTED_GEOMETRY",
        GeometryError::MalformedQuad => "MALFORMED_GEOMETRY",
    };
    error_response(StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
}

pub fn compositor_error_response(err: &CompositorError) -> HttpResponse {
    use actix_web::http::StatusCode;
    match err {
        CompositorError::ArtworkDecode(e) => bad_request(
            "ARTWORK_DECODE_FAILED",
            format!("Artwork is not a decodable raster: {}", e),
        ),
        CompositorError::FetchFailed(msg) => bad_request("ARTWORK_FETCH_FAILED", msg.clone()),
        CompositorError::Http(e) => bad_request("ARTWORK_FETCH_FAILED", e.to_string()),
        CompositorError::UnsupportedGeometry(msg) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "UNSUPPORTED_GEOMETRY",
            msg.clone(),
        ),
        other => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "COMPOSITING_FAILED",
            other.to_string(),
        ),
    }
}

pub fn authoring_error_response(err: &AuthoringError) -> HttpResponse {
    match err {
        AuthoringError::Decode(which, e) => bad_request(
            "ARTWORK_DECODE_FAILED",
            format!("Failed to decode {} image: {}", which, e),
        ),
        AuthoringError::EmptyMask => bad_request(
            "EMPTY_MASK",
            "Mask contains no placement region".to_string(),
        ),
        AuthoringError::Geometry(e) => geometry_error_response(e),
        AuthoringError::Store(e) => store_error_response(e),
    }
}

pub fn batch_error_response(err: &BatchError) -> HttpResponse {
    match err {
        BatchError::RoomEmpty(room) => {
            store_error_response(&StoreError::RoomEmpty(room.clone()))
        }
        BatchError::Compositor(e) => compositor_error_response(e),
    }
}

pub fn param_error_response(err: &ParamError) -> HttpResponse {
    bad_request("INVALID_PARAMS", err.to_string())
}

pub fn upload_error_response(err: &UploadError) -> HttpResponse {
    match err {
        UploadError::TooLarge(_) => error_response(
            actix_web::http::StatusCode::PAYLOAD_TOO_LARGE,
            "UPLOAD_TOO_LARGE",
            err.to_string(),
        ),
        _ => bad_request("INVALID_UPLOAD", err.to_string()),
    }
}
