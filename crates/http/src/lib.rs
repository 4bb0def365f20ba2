//! HTTP server facade for the bookstore: Axum router assembly, error
//! envelopes and OpenAPI documentation.

use std::future::Future;

use anyhow::Context;
use axum::{routing::get, Router};

use bookstore_kernel::settings::Settings;
use bookstore_kernel::ModuleRegistry;

pub mod error;
pub mod router;

pub use error::{AppError, ErrorBody};
use router::RouterBuilder;

/// Bind the configured address and serve until `shutdown` resolves.
///
/// In-flight requests are allowed to finish before this returns.
pub async fn start_server<S>(
    registry: &ModuleRegistry,
    settings: &Settings,
    shutdown: S,
) -> anyhow::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let app = build_router(registry, settings);
    let addr = format!("{}:{}", settings.server.host, settings.server.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server drained");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let mut router_builder = RouterBuilder::new().route("/healthz", get(health_check));

    for module in registry.modules() {
        let module_name = module.name();
        tracing::debug!(module = module_name, "mounting module routes under /api/{}", module_name);
        router_builder = router_builder.mount_module(module_name, module.routes());
    }

    router_builder
        .with_openapi(registry)
        .with_timeout(settings.server.request_timeout())
        .with_request_id()
        .with_cors()
        .with_tracing()
        .build()
}

async fn health_check() -> &'static str {
    "ok"
}
