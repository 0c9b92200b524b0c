use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;

use super::problem::Problem;
use crate::error::RouterError;

/// Map a router error to a Problem response.
#[must_use]
pub fn router_error_to_problem(e: &RouterError, instance: &str) -> Problem {
    let trace_id = tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string());

    let (status, title) = match e {
        RouterError::Validation(_) | RouterError::Hook { .. } => {
            (StatusCode::BAD_REQUEST, "Bad Request")
        }
        RouterError::Forbidden(_)
        | RouterError::UnwritableFields { .. }
        | RouterError::TransformRejected(_)
        | RouterError::HookAborted { .. } => (StatusCode::FORBIDDEN, "Forbidden"),
        RouterError::OperationNotAllowed(_) => {
            (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        }
        RouterError::NotFound(_) => (StatusCode::NOT_FOUND, "Not Found"),
        RouterError::UnknownVariant { .. } | RouterError::Store(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    };

    let detail = if e.is_internal() {
        // Log the internal error details but don't expose them to the client
        tracing::error!(error = %e, code = e.code(), "Internal error occurred");
        "An internal error occurred".to_owned()
    } else {
        e.to_string()
    };

    Problem::new(status, title, detail)
        .with_code(e.code())
        .with_instance(instance)
        .with_trace_id(trace_id)
}

/// Implement Into<Problem> for `RouterError` so `?` works in handlers
impl From<RouterError> for Problem {
    fn from(e: RouterError) -> Self {
        router_error_to_problem(&e, "/")
    }
}

/// Malformed or non-JSON request bodies.
#[must_use]
pub fn json_rejection_to_problem(rejection: &JsonRejection, instance: &str) -> Problem {
    Problem::new(StatusCode::BAD_REQUEST, "Bad Request", rejection.body_text())
        .with_code("invalid_body")
        .with_instance(instance)
}

#[cfg(test)]
mod tests {
    use resource_security::Classification;
    use tracing_test::traced_test;

    use super::*;
    use crate::error::HookStage;

    #[test]
    fn statuses_follow_error_taxonomy() {
        let cases = [
            (RouterError::validation("bad"), 400),
            (
                RouterError::Hook {
                    stage: HookStage::PreCreate,
                    message: "x".to_owned(),
                },
                400,
            ),
            (RouterError::Forbidden("no".to_owned()), 403),
            (
                RouterError::UnwritableFields {
                    classification: Classification::Owner,
                    fields: vec!["ownerId".to_owned()],
                },
                403,
            ),
            (
                RouterError::HookAborted {
                    stage: HookStage::PreUpdate,
                },
                403,
            ),
            (RouterError::OperationNotAllowed("no".to_owned()), 405),
            (RouterError::not_found("gone"), 404),
            (RouterError::Store("disk".to_owned()), 500),
        ];
        for (err, status) in cases {
            assert_eq!(router_error_to_problem(&err, "/foods").status, status, "{err}");
        }
    }

    #[test]
    #[traced_test]
    fn internal_details_are_hidden() {
        let err = RouterError::Store("connection refused".to_owned());
        let problem = router_error_to_problem(&err, "/foods");
        assert_eq!(problem.detail, "An internal error occurred");
        assert_eq!(problem.code, "storage_failure");
        assert!(logs_contain("connection refused"));
    }

    #[test]
    fn detail_carries_verbatim_message() {
        let problem = router_error_to_problem(
            &RouterError::validation("Invalid page: abc"),
            "/foods",
        );
        assert_eq!(problem.detail, "Invalid page: abc");
        assert_eq!(problem.instance, "/foods");
        assert_eq!(problem.title, "Bad Request");
    }
}
