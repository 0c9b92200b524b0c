use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{Request, Response};
use axum::middleware::from_fn;
use axum::routing::get;
use axum::{Json, Router};
use resource_router::{MemoryDatabase, register_routes};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::field::Empty;

use crate::auth;
use crate::config::AppConfig;
use crate::resources;

/// Assemble the HTTP stack over `db`.
///
/// # Errors
/// When a resource definition rejects the configured router defaults.
pub fn build_app(config: &AppConfig, db: &MemoryDatabase) -> anyhow::Result<Router> {
    let mut router = Router::new()
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }));
    router = register_routes(router, "/users", Arc::new(resources::users(db, &config.router)?));
    router = register_routes(router, "/foods", Arc::new(resources::foods(db, &config.router)?));

    let body_limit = config.server.body_limit_bytes;
    Ok(router
        // innermost: the actor must be attached before any handler runs
        .layer(from_fn(auth::header_actor))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<axum::body::Body>| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("n/a");
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri().path(),
                        request_id = %request_id,
                        status = Empty,
                        latency_ms = Empty,
                    )
                })
                .on_response(
                    |res: &Response<axum::body::Body>, latency: Duration, span: &tracing::Span| {
                        span.record("status", res.status().as_u16());
                        span.record("latency_ms", latency.as_millis());
                    },
                ),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl-C; shutting down");
    }
    tracing::info!("HTTP server shutting down gracefully");
}

/// Bind, serve until Ctrl-C, then drain in-flight requests.
///
/// # Errors
/// An unparsable bind address, a socket that cannot be bound, or a server
/// failure.
pub async fn run(config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("Invalid bind address '{}'", config.server.bind_addr))?;

    let db = MemoryDatabase::new();
    let app = build_app(config, &db)?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server bound on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")
}
