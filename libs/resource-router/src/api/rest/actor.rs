use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use resource_security::Actor;

/// Optional caller attached to the request by the authentication step.
///
/// Absence means a fully anonymous caller; extraction never fails.
#[derive(Debug, Clone, Default)]
pub struct MaybeActor(pub Option<Actor>);

impl MaybeActor {
    #[must_use]
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for MaybeActor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Actor>().cloned()))
    }
}
