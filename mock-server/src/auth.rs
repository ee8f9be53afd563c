use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use tracing::warn;

use crate::error::AppError;

/// The caller, identified by the bearer token. The mock server trusts any
/// non-empty token and uses it verbatim as the user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User(pub String);

impl<S: Send + Sync> FromRequestParts<S> for User {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        match token {
            Some(token) => Ok(User(token.to_string())),
            None => {
                warn!(path = %parts.uri.path(), "unauthorized request");
                Err(AppError::Unauthorized)
            }
        }
    }
}
