//! HTTP server facade for turfbook with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{extract::Request, http::HeaderValue, routing::get, Router};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::{Timestamp, Uuid};

use turfbook_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod extract;
pub mod router;

pub use error::AppError;
pub use extract::AppJson;

use router::RouterBuilder;

/// Start the HTTP server with the given module registry; returns after Ctrl-C
pub async fn start_server(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        "starting HTTP server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    let app = build_router(registry, settings);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))
            .await
            .context("failed to bind to address")?;

    tracing::info!(
        "HTTP server listening on http://{}",
        listener
            .local_addr()
            .context("failed to read bound address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let mut api = Router::new();
    for module in registry.modules() {
        tracing::info!(
            module = module.name(),
            prefix = %settings.server.api_prefix,
            "mounting module routes"
        );
        api = api.merge(module.routes());
    }

    RouterBuilder::new()
        .route("/healthz", get(health_check))
        .mount_api(&settings.server.api_prefix, api)
        .with_openapi(registry, &settings.server.api_prefix)
        .with_tracing()
        .with_cors()
        .with_timeout(settings.server.request_timeout_ms)
        .with_request_id()
        .build()
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

/// Request ID generator producing time-ordered UUIDv7 values
#[derive(Clone)]
pub(crate) struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let timestamp = Timestamp::now(uuid::NoContext);
        let request_id = Uuid::new_v7(timestamp)
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(request_id))
    }
}
