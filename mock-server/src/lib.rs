//! In-memory implementation of the Tasker `/api` surface.
//!
//! Used by the core crate's integration tests and for local development.
//! Authentication is a stand-in: any bearer token is accepted and becomes
//! the user id, so tests can act as several users.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod store;

pub use error::AppError;
pub use store::Store;

/// Room for a maximum-size file plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = store::MAX_UPLOAD_BYTES + 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
    pub environment: String,
}

impl AppState {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            store: Arc::new(RwLock::new(Store::new())),
            environment: environment.into(),
        }
    }
}

pub fn app() -> Router {
    app_with_state(AppState::new("local"))
}

pub fn app_with_state(state: AppState) -> Router {
    use handlers::*;

    let v1 = Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/stats", get(todo_stats))
        .route(
            "/todos/{id}",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route(
            "/todos/{id}/attachments",
            post(upload_attachment).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/todos/{id}/attachments/{attachment_id}",
            axum::routing::delete(delete_attachment),
        )
        .route(
            "/todos/{id}/attachments/{attachment_id}/download",
            get(attachment_download_url),
        )
        .route("/todos/{id}/comments", get(list_comments).post(add_comment))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category)
                .patch(update_category)
                .delete(delete_category),
        )
        .route(
            "/comments/{id}",
            axum::routing::patch(update_comment).delete(delete_comment),
        );

    let api = Router::new()
        .nest("/v1", v1)
        .route("/status", get(health));

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}
