use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use super::handlers;
use crate::router::ResourceRouter;

/// Mount the eight routes of one resource under `path` (e.g. `/foods`).
///
/// The resource rides along as a route-local extension, so several resources
/// can share one `Router`.
#[must_use]
pub fn register_routes(router: Router, path: &str, resource: Arc<ResourceRouter>) -> Router {
    let path = path.trim_end_matches('/');
    let routes = Router::new()
        .route(path, get(handlers::list).post(handlers::create))
        .route(
            &format!("{path}/{{id}}"),
            get(handlers::read)
                .patch(handlers::update)
                .delete(handlers::delete),
        )
        .route(&format!("{path}/{{id}}/{{field}}"), post(handlers::add_item))
        .route(
            &format!("{path}/{{id}}/{{field}}/{{child_id}}"),
            axum::routing::patch(handlers::update_item).delete(handlers::remove_item),
        )
        .layer(axum::Extension(resource));

    tracing::debug!(path, "Registered resource routes");
    router.merge(routes)
}
