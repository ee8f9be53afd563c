//! Binds built requests to a live transport.
//!
//! # Design
//! `ApiClient` is stateless per call. For every attempt it asks the
//! `TokenProvider` for a bearer token and injects it; a `401` is retried up
//! to `MAX_UNAUTHORIZED_RETRIES` more times with a fresh token. Nothing else
//! is retried and there is no backoff. A transport failure with no response
//! becomes a synthetic `500` carrying `{"message":"Internal server error"}`,
//! so callers always get an `HttpResponse` to parse.

use serde_json::json;
use tracing::{debug, warn};

use crate::http::{HttpRequest, HttpResponse};
use crate::transport::Transport;

/// Extra attempts after the first `401`.
pub const MAX_UNAUTHORIZED_RETRIES: u32 = 2;

/// Supplies bearer tokens from the identity provider.
pub trait TokenProvider: Send + Sync {
    /// Current token, or `None` when signed out.
    fn token(&self) -> Option<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// A fixed token, for service callers and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient<T, P> {
    transport: T,
    tokens: P,
}

impl<T: Transport, P: TokenProvider> ApiClient<T, P> {
    pub fn new(transport: T, tokens: P) -> Self {
        Self { transport, tokens }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute `request`, retrying on `401`.
    pub fn execute(&self, request: &HttpRequest) -> HttpResponse {
        let mut attempt = 0;
        loop {
            let mut outgoing = request.clone();
            if let Some(token) = self.tokens.token() {
                outgoing.set_header("authorization", format!("Bearer {token}"));
            }

            match self.transport.execute(&outgoing) {
                Ok(response) if response.status == 401 && attempt < MAX_UNAUTHORIZED_RETRIES => {
                    attempt += 1;
                    warn!(
                        method = request.method.as_str(),
                        path = %request.path,
                        attempt,
                        "unauthorized, retrying"
                    );
                }
                Ok(response) => {
                    debug!(status = response.status, path = %request.path, "request finished");
                    return response;
                }
                Err(err) => {
                    warn!(error = %err, path = %request.path, "transport failure");
                    return HttpResponse::json(500, &json!({ "message": "Internal server error" }));
                }
            }
        }
    }
}
