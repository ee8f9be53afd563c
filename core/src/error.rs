//! Error types for the Tasker API client.
//!
//! # Design
//! Every non-success status lands in `Http` with the status and whatever body
//! the server sent, decoded as JSON when possible. There is no per-status
//! branching: callers that care inspect `status()`. `Validation` covers
//! client-side checks that reject a request before it reaches the network.

use serde_json::Value;
use thiserror::Error;

/// Errors returned by `TodoClient` build/parse methods and the hook layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered with a status other than the operation's success
    /// status. `body` is the decoded JSON payload, or the raw text wrapped in
    /// a JSON string when it was not JSON.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: Value },

    /// The request was rejected locally before any network call.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Build an `Http` error from a raw response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let body = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()))
        };
        ApiError::Http { status, body }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Message suitable for a user-facing notification.
    ///
    /// Uses the server's `message` field when the body carries one, the
    /// validation text for local rejections, and `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Http { body, .. } => body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or(fallback)
                .to_string(),
            ApiError::Validation(msg) => msg.clone(),
            _ => fallback.to_string(),
        }
    }
}
