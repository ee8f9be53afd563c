use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::auth::User;
use crate::error::AppError;
use crate::extract::{AppJson, AppPath, AppQuery};
use crate::models::{
    Attachment, Category, CategoryQuery, Comment, CommentInput, CreateCategory, CreateTodo, Health,
    HealthCheck, HealthChecks, Paginated, PopulatedTodo, PresignedUrl, Todo, TodoQuery, TodoStats,
    UpdateCategory, UpdateTodo,
};
use crate::AppState;

/// Host used in presigned download links.
pub const STORAGE_URL: &str = "http://localhost:9000/tasker-attachments";

// --- todos ---

pub async fn list_todos(
    State(state): State<AppState>,
    User(user): User,
    AppQuery(query): AppQuery<TodoQuery>,
) -> Result<Json<Paginated<PopulatedTodo>>, AppError> {
    let store = state.store.read().await;
    store.list_todos(&user, &query).map(Json)
}

pub async fn create_todo(
    State(state): State<AppState>,
    User(user): User,
    AppJson(input): AppJson<CreateTodo>,
) -> Result<(StatusCode, Json<Todo>), AppError> {
    let todo = state.store.write().await.create_todo(&user, input)?;
    debug!(id = %todo.id, "created todo");
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn get_todo(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PopulatedTodo>, AppError> {
    state.store.read().await.get_todo(&user, id).map(Json)
}

pub async fn update_todo(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateTodo>,
) -> Result<Json<Todo>, AppError> {
    state.store.write().await.update_todo(&user, id, input).map(Json)
}

pub async fn delete_todo(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.write().await.delete_todo(&user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn todo_stats(State(state): State<AppState>, User(user): User) -> Json<TodoStats> {
    Json(state.store.read().await.todo_stats(&user))
}

// --- attachments ---

pub async fn upload_attachment(
    State(state): State<AppState>,
    User(user): User,
    AppPath(todo_id): AppPath<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Attachment>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or("file").to_string();
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        let attachment = state
            .store
            .write()
            .await
            .add_attachment(&user, todo_id, name, mime_type, bytes.len())?;
        debug!(id = %attachment.id, size = bytes.len(), "stored attachment");
        return Ok((StatusCode::CREATED, Json(attachment)));
    }
    Err(AppError::BadRequest("file is required".to_string()))
}

pub async fn delete_attachment(
    State(state): State<AppState>,
    User(user): User,
    AppPath((todo_id, attachment_id)): AppPath<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .write()
        .await
        .delete_attachment(&user, todo_id, attachment_id)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn attachment_download_url(
    State(state): State<AppState>,
    User(user): User,
    AppPath((todo_id, attachment_id)): AppPath<(Uuid, Uuid)>,
) -> Result<Json<PresignedUrl>, AppError> {
    let key = state
        .store
        .read()
        .await
        .attachment_key(&user, todo_id, attachment_id)?;
    Ok(Json(PresignedUrl {
        url: format!("{STORAGE_URL}/{key}?expires=3600"),
    }))
}

// --- categories ---

pub async fn list_categories(
    State(state): State<AppState>,
    User(user): User,
    AppQuery(query): AppQuery<CategoryQuery>,
) -> Result<Json<Paginated<Category>>, AppError> {
    state.store.read().await.list_categories(&user, &query).map(Json)
}

pub async fn create_category(
    State(state): State<AppState>,
    User(user): User,
    AppJson(input): AppJson<CreateCategory>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    let category = state.store.write().await.create_category(&user, input)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Category>, AppError> {
    state.store.read().await.get_category(&user, id).map(Json)
}

pub async fn update_category(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UpdateCategory>,
) -> Result<Json<Category>, AppError> {
    state
        .store
        .write()
        .await
        .update_category(&user, id, input)
        .map(Json)
}

pub async fn delete_category(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.write().await.delete_category(&user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- comments ---

pub async fn add_comment(
    State(state): State<AppState>,
    User(user): User,
    AppPath(todo_id): AppPath<Uuid>,
    AppJson(input): AppJson<CommentInput>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let comment = state
        .store
        .write()
        .await
        .add_comment(&user, todo_id, input.content)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    User(user): User,
    AppPath(todo_id): AppPath<Uuid>,
) -> Result<Json<Vec<Comment>>, AppError> {
    state.store.read().await.list_comments(&user, todo_id).map(Json)
}

pub async fn update_comment(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<CommentInput>,
) -> Result<Json<Comment>, AppError> {
    state
        .store
        .write()
        .await
        .update_comment(&user, id, input.content)
        .map(Json)
}

pub async fn delete_comment(
    State(state): State<AppState>,
    User(user): User,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.store.write().await.delete_comment(&user, id)?;
    Ok(StatusCode::NO_CONTENT)
}

// --- health ---

pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let started = std::time::Instant::now();
    drop(state.store.read().await);
    let elapsed = started.elapsed();

    Json(Health {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        environment: state.environment.clone(),
        checks: HealthChecks {
            database: HealthCheck {
                status: "healthy".to_string(),
                response_time: format!("{}ms", elapsed.as_millis()),
                error: None,
            },
        },
    })
}
