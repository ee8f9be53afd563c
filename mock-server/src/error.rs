use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::debug;

/// Handler failure, rendered as `{"message": ...}` like the real service.
#[derive(Debug, PartialEq, Eq)]
pub enum AppError {
    Unauthorized,
    NotFound(&'static str),
    BadRequest(String),
    /// Input an extractor refused; keeps the extractor's status.
    Rejected { status: StatusCode, message: String },
}

impl AppError {
    fn rejected(status: StatusCode, message: String) -> Self {
        debug!(%status, %message, "rejected request input");
        AppError::Rejected { status, message }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::rejected(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Rejected { status, message } => (status, message),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}
