//! HTTP surface of a resource router.
//!
//! Routes orchestrate but don't contain business logic: handlers decode the
//! request, call [`crate::ResourceRouter`] and map errors to RFC 9457 problems.

pub mod actor;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod problem;
pub mod query_params;
pub mod routes;

pub use actor::MaybeActor;
pub use problem::{ApiResult, Problem};
pub use routes::register_routes;
