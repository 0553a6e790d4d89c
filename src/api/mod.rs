//! API module - HTTP routes and handlers

pub mod handlers;
pub mod multipart;
pub mod openapi;

use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::openapi::ApiDoc;

/// Configure all API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(
                web::scope("/mockups")
                    .route("/generate", web::post().to(handlers::generate::generate_mockup))
                    .route("/batch", web::post().to(handlers::batch::generate_batch)),
            )
            .service(
                web::scope("/artwork")
                    .route("/print-files", web::post().to(handlers::printfiles::print_files)),
            )
            .service(
                web::scope("/templates")
                    // More specific routes first
                    .route("/create", web::post().to(handlers::templates::create_template_handler))
                    .route(
                        "/register-layered",
                        web::post().to(handlers::templates::register_layered),
                    )
                    .route("/analyze", web::post().to(handlers::analyze::analyze_design_file))
                    // General routes
                    .route("", web::get().to(handlers::templates::list_templates))
                    .route(
                        "/{room}/{template_id}",
                        web::get().to(handlers::templates::get_template),
                    )
                    .route(
                        "/{room}/{template_id}",
                        web::delete().to(handlers::templates::delete_template),
                    ),
            ),
    )
    .route("/health", web::get().to(handlers::health::health_check))
    // Swagger UI and OpenAPI spec
    .service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
