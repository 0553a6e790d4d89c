//! Roomshot
//!
//! Wall-art mockup compositing API using Rust + Actix-Web.
//! Warps artwork into photographed or PSD-authored room scenes and emits
//! print-ready JPEGs at 300 DPI.

use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;

mod api;
mod config;
mod domain;
mod engine;
mod store;

use crate::config::Settings;
use crate::engine::scene::seed_builtin_templates;
use crate::engine::{BatchOrchestrator, Compositor, RenderLimits};
use crate::store::TemplateStore;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<TemplateStore>,
    pub compositor: Arc<Compositor>,
    pub batch: BatchOrchestrator,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roomshot=info".parse()?)
                .add_directive("actix_web=info".parse()?),
        )
        .json()
        .init();

    // Load configuration
    let settings = Settings::load()?;
    let bind_addr = format!("{}:{}", settings.server.host, settings.server.port);

    info!(
        "Starting Roomshot v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    // Initialize template store and load manifests
    let store = Arc::new(TemplateStore::new(
        &settings.templates.path,
        settings.render.placeholder_layers.clone(),
    ));
    store.load_all().await?;

    // Seed procedural room scenes so a fresh install can render mockups
    if settings.templates.seed_builtin {
        let seeded = seed_builtin_templates(&store).await?;
        if seeded > 0 {
            info!(seeded, "Builtin scenes added to template store");
        }
    }
    info!("Loaded {} templates", store.template_count());

    let compositor = Arc::new(Compositor::new(RenderLimits::from(&settings.render)));
    let batch = BatchOrchestrator::new(
        store.clone(),
        compositor.clone(),
        settings.render.batch_concurrency,
    );

    api::handlers::health::mark_started();

    let workers = settings
        .server
        .workers
        .unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState {
        settings: settings.clone(),
        store,
        compositor,
        batch,
    });

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Middleware (order matters)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "roomshot"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            // Routes
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
