//! OpenAPI 3.0 specification definition

use utoipa::OpenApi;

use crate::api::handlers::{
    analyze::{AnalyzeResponse, PlaceholderSummary},
    batch::{BatchResponse, BatchSlot},
    generate::{Dimensions, GenerateMetadata, GenerateResponse},
    health::HealthResponse,
    printfiles::{PrintFileEntry, PrintFilesResponse},
    templates::{
        ManifestSummary, TemplateCreatedResponse, TemplateResponse, TemplatesListResponse,
    },
    ApiError, ErrorResponse,
};
use crate::domain::{
    BlendMode, FitMode, PlacementGeometry, Point, Region, RenderParams, SourceFormat,
    TemplateDescriptor,
};
use crate::engine::layered::LayerNode;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Roomshot API",
        version = "1.0.0",
        description = "Wall-art mockup compositing service: planar warp, PSD placeholder templates, print-ready output",
        contact(
            name = "API Support",
            email = "support@example.com"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "system", description = "System health and status endpoints"),
        (name = "mockups", description = "Mockup generation endpoints"),
        (name = "artwork", description = "Artwork preparation endpoints"),
        (name = "templates", description = "Template management endpoints")
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::generate::generate_mockup,
        crate::api::handlers::batch::generate_batch,
        crate::api::handlers::printfiles::print_files,
        crate::api::handlers::templates::list_templates,
        crate::api::handlers::templates::get_template,
        crate::api::handlers::templates::create_template_handler,
        crate::api::handlers::templates::register_layered,
        crate::api::handlers::templates::delete_template,
        crate::api::handlers::analyze::analyze_design_file,
    ),
    components(
        schemas(
            // Health schemas
            HealthResponse,
            // Generate schemas
            GenerateResponse,
            GenerateMetadata,
            Dimensions,
            // Batch schemas
            BatchResponse,
            BatchSlot,
            // Print-file schemas
            PrintFilesResponse,
            PrintFileEntry,
            // Template schemas
            TemplatesListResponse,
            TemplateResponse,
            TemplateCreatedResponse,
            ManifestSummary,
            TemplateDescriptor,
            PlacementGeometry,
            SourceFormat,
            RenderParams,
            BlendMode,
            FitMode,
            Point,
            Region,
            // Analyze schemas
            AnalyzeResponse,
            PlaceholderSummary,
            LayerNode,
            // Error schemas
            ErrorResponse,
            ApiError,
        )
    )
)]
pub struct ApiDoc;
