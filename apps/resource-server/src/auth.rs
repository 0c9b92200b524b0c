//! Development-only authentication stand-in.
//!
//! Trusts caller-supplied headers and attaches the resulting [`Actor`] to the
//! request extensions, where the resource handlers look for it. Never expose a
//! server running this middleware to untrusted clients.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use resource_security::Actor;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ADMIN_HEADER: &str = "x-actor-admin";
pub const ACTOR_ANONYMOUS_HEADER: &str = "x-actor-anonymous";

fn flag(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

/// `None` when no actor id header is present.
#[must_use]
pub fn actor_from_headers(headers: &HeaderMap) -> Option<Actor> {
    let id = headers
        .get(ACTOR_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())?;
    Some(
        Actor::builder()
            .id(id)
            .admin(flag(headers, ACTOR_ADMIN_HEADER))
            .anonymous(flag(headers, ACTOR_ANONYMOUS_HEADER))
            .build(),
    )
}

pub async fn header_actor(mut req: Request, next: Next) -> Response {
    if let Some(actor) = actor_from_headers(req.headers()) {
        tracing::debug!(actor = actor.id(), admin = actor.is_admin(), "Actor from headers");
        req.extensions_mut().insert(actor);
    }
    next.run(req).await
}
