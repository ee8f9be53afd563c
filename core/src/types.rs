//! Domain DTOs for the Tasker API.
//!
//! # Design
//! Each type is the single definition of its wire shape: serde derives the
//! JSON encoding, `schemars` derives the schema published in the OpenAPI
//! document, and the `Validate` impls next to the request types hold the
//! runtime checks applied before a request leaves the client. The mock
//! server keeps its own copies; integration tests catch drift between them.
//!
//! Nullable fields of partial updates use `Option<Option<T>>`: the outer
//! `None` leaves the field untouched, `Some(None)` clears it.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Largest attachment accepted by the upload form.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_CATEGORY_NAME_CHARS: usize = 100;
pub const MAX_CATEGORY_DESCRIPTION_CHARS: usize = 500;
pub const MAX_COMMENT_CHARS: usize = 1000;
pub const MAX_PAGE_LIMIT: u32 = 100;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl TodoPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            TodoPriority::Low => "low",
            TodoPriority::Medium => "medium",
            TodoPriority::High => "high",
        }
    }
}

/// Free-form annotations attached to a todo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TodoMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TodoStatus,
    pub priority: TodoPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parent_todo_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub metadata: Option<TodoMetadata>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub todo_id: Uuid,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    pub todo_id: Uuid,
    pub name: String,
    pub uploaded_by: String,
    pub download_key: String,
    pub file_size: Option<u64>,
    pub mime_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A todo joined with its category, direct children, comments and
/// attachments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedTodo {
    #[serde(flatten)]
    pub todo: Todo,
    pub category: Option<Category>,
    pub children: Vec<Todo>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

/// Per-status counters for the current user's todos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TodoStats {
    pub total: u64,
    pub draft: u64,
    pub active: u64,
    pub completed: u64,
    pub archived: u64,
    pub overdue: u64,
}

/// Presigned download link for an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AttachmentDownload {
    #[schemars(url)]
    pub url: String,
}

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    /// Empty page used while the first response is in flight.
    pub fn placeholder(limit: u32) -> Self {
        Self {
            data: Vec::new(),
            total: 0,
            page: 1,
            limit,
            total_pages: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HealthCheck {
    pub status: String,
    pub response_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HealthChecks {
    pub database: HealthCheck,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis: Option<HealthCheck>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub checks: HealthChecks,
}

// ---------------------------------------------------------------------------
// List queries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoSortField {
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    DueDate,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CategorySortField {
    CreatedAt,
    UpdatedAt,
    Name,
}

/// Query parameters accepted by `GET /v1/todos`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TodoListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<TodoSortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TodoPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_todo_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_to: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overdue: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Query parameters accepted by `GET /v1/categories`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CategoryListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<CategorySortField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(length(min = 1))]
    pub search: Option<String>,
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TodoPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_todo_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TodoMetadata>,
}

/// Partial todo update. Only the fields present in the JSON are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schemars(with = "Option<String>")]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TodoStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TodoPriority>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schemars(with = "Option<DateTime<Utc>>")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schemars(with = "Option<Uuid>")]
    pub parent_todo_id: Option<Option<Uuid>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schemars(with = "Option<Uuid>")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schemars(with = "Option<TodoMetadata>")]
    pub metadata: Option<Option<TodoMetadata>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CreateCategory {
    pub name: String,
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdateCategory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "::serde_with::rust::double_option"
    )]
    #[schemars(with = "Option<String>")]
    pub description: Option<Option<String>>,
}

/// Body of both `addComment` and `updateComment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommentBody {
    pub content: String,
}

/// A file staged for upload to a todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Client-side validation
// ---------------------------------------------------------------------------

/// Checks a request value before it is sent.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// User-facing texts for one length-checked field.
struct FieldRule {
    max: usize,
    empty: Option<&'static str>,
    too_long: &'static str,
}

const TITLE: FieldRule = FieldRule {
    max: MAX_TITLE_CHARS,
    empty: Some("Title is required"),
    too_long: "Title too long",
};
const NAME: FieldRule = FieldRule {
    max: MAX_CATEGORY_NAME_CHARS,
    empty: Some("Name is required"),
    too_long: "Name too long",
};
const COLOR: FieldRule = FieldRule {
    max: usize::MAX,
    empty: Some("Color is required"),
    too_long: "Color too long",
};
const DESCRIPTION: FieldRule = FieldRule {
    max: MAX_CATEGORY_DESCRIPTION_CHARS,
    empty: None,
    too_long: "Description too long",
};
const CONTENT: FieldRule = FieldRule {
    max: MAX_COMMENT_CHARS,
    empty: Some("Comment cannot be empty"),
    too_long: "Comment too long",
};

fn check_len(rule: &FieldRule, value: &str) -> Result<(), ApiError> {
    let len = value.chars().count();
    if let (0, Some(empty)) = (len, rule.empty) {
        return Err(ApiError::Validation(empty.to_string()));
    }
    if len > rule.max {
        return Err(ApiError::Validation(rule.too_long.to_string()));
    }
    Ok(())
}

fn check_paging(page: Option<u32>, limit: Option<u32>, search: Option<&str>) -> Result<(), ApiError> {
    if page == Some(0) {
        return Err(ApiError::Validation("page must be at least 1".to_string()));
    }
    if let Some(limit) = limit {
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(ApiError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
    }
    if search.is_some_and(str::is_empty) {
        return Err(ApiError::Validation("search must not be empty".to_string()));
    }
    Ok(())
}

impl Validate for TodoListQuery {
    fn validate(&self) -> Result<(), ApiError> {
        check_paging(self.page, self.limit, self.search.as_deref())?;
        if let (Some(from), Some(to)) = (self.due_from, self.due_to) {
            if from > to {
                return Err(ApiError::Validation("dueFrom must not be after dueTo".to_string()));
            }
        }
        Ok(())
    }
}

impl Validate for CategoryListQuery {
    fn validate(&self) -> Result<(), ApiError> {
        check_paging(self.page, self.limit, self.search.as_deref())
    }
}

impl Validate for CreateTodo {
    fn validate(&self) -> Result<(), ApiError> {
        check_len(&TITLE, &self.title)
    }
}

impl Validate for UpdateTodo {
    fn validate(&self) -> Result<(), ApiError> {
        match &self.title {
            Some(title) => check_len(&TITLE, title),
            None => Ok(()),
        }
    }
}

impl Validate for CreateCategory {
    fn validate(&self) -> Result<(), ApiError> {
        check_len(&NAME, &self.name)?;
        check_len(&COLOR, &self.color)?;
        if let Some(description) = &self.description {
            check_len(&DESCRIPTION, description)?;
        }
        Ok(())
    }
}

impl Validate for UpdateCategory {
    fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            check_len(&NAME, name)?;
        }
        if let Some(color) = &self.color {
            check_len(&COLOR, color)?;
        }
        if let Some(Some(description)) = &self.description {
            check_len(&DESCRIPTION, description)?;
        }
        Ok(())
    }
}

impl Validate for CommentBody {
    fn validate(&self) -> Result<(), ApiError> {
        check_len(&CONTENT, &self.content)
    }
}

impl Validate for AttachmentUpload {
    fn validate(&self) -> Result<(), ApiError> {
        if self.file_name.is_empty() {
            return Err(ApiError::Validation("File name is required".to_string()));
        }
        if self.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ApiError::Validation(format!(
                "File {} is too large (max 10MB)",
                self.file_name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populated_todo_flattens_todo_fields() {
        let raw = r#"{
            "id":"00000000-0000-0000-0000-000000000001",
            "userId":"user_1",
            "title":"Buy milk",
            "description":null,
            "status":"draft",
            "priority":"medium",
            "dueDate":null,
            "completedAt":null,
            "parentTodoId":null,
            "categoryId":null,
            "metadata":{"tags":["home"]},
            "sortOrder":0,
            "createdAt":"2025-01-15T10:00:00Z",
            "updatedAt":"2025-01-15T10:00:00Z",
            "category":null,
            "children":[],
            "comments":[],
            "attachments":[]
        }"#;
        let todo: PopulatedTodo = serde_json::from_str(raw).unwrap();
        assert_eq!(todo.todo.title, "Buy milk");
        assert_eq!(todo.todo.status, TodoStatus::Draft);
        assert_eq!(
            todo.todo.metadata.and_then(|m| m.tags),
            Some(vec!["home".to_string()])
        );
        assert!(todo.children.is_empty());
    }

    #[test]
    fn update_todo_distinguishes_absent_from_null() {
        let update = UpdateTodo {
            due_date: Some(None),
            ..UpdateTodo::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "dueDate": null }));

        let parsed: UpdateTodo = serde_json::from_str(r#"{"categoryId":null}"#).unwrap();
        assert_eq!(parsed.category_id, Some(None));
        assert_eq!(parsed.description, None);
    }

    #[test]
    fn list_query_omits_unset_fields() {
        let query = TodoListQuery {
            page: Some(2),
            sort: Some(TodoSortField::DueDate),
            ..TodoListQuery::default()
        };
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json, serde_json::json!({ "page": 2, "sort": "due_date" }));
    }

    #[test]
    fn paging_bounds_are_enforced() {
        let ok = TodoListQuery { page: Some(1), limit: Some(100), ..Default::default() };
        assert!(ok.validate().is_ok());

        let zero_page = TodoListQuery { page: Some(0), ..Default::default() };
        assert!(matches!(zero_page.validate(), Err(ApiError::Validation(_))));

        let big_limit = CategoryListQuery { limit: Some(101), ..Default::default() };
        assert!(matches!(big_limit.validate(), Err(ApiError::Validation(_))));

        let empty_search = CategoryListQuery { search: Some(String::new()), ..Default::default() };
        assert!(matches!(empty_search.validate(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn inverted_due_range_is_rejected() {
        let query = TodoListQuery {
            due_from: Some("2025-02-01T00:00:00Z".parse().unwrap()),
            due_to: Some("2025-01-01T00:00:00Z".parse().unwrap()),
            ..Default::default()
        };
        assert!(query.validate().is_err());
    }

    #[test]
    fn title_length_rules() {
        let empty = CreateTodo { title: String::new(), ..Default::default() };
        let err = empty.validate().unwrap_err();
        assert_eq!(err.user_message("x"), "Title is required");

        let long = CreateTodo { title: "a".repeat(256), ..Default::default() };
        assert_eq!(long.validate().unwrap_err().user_message("x"), "Title too long");

        let fine = CreateTodo { title: "a".repeat(255), ..Default::default() };
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn category_rules() {
        let missing_color = CreateCategory {
            name: "Work".to_string(),
            color: String::new(),
            description: None,
        };
        assert_eq!(
            missing_color.validate().unwrap_err().user_message("x"),
            "Color is required"
        );

        let long_description = UpdateCategory {
            description: Some(Some("d".repeat(501))),
            ..Default::default()
        };
        assert_eq!(
            long_description.validate().unwrap_err().user_message("x"),
            "Description too long"
        );

        let clear_description = UpdateCategory {
            description: Some(None),
            ..Default::default()
        };
        assert!(clear_description.validate().is_ok());
    }

    #[test]
    fn comment_content_rules() {
        let empty = CommentBody { content: String::new() }.validate().unwrap_err();
        assert_eq!(empty.user_message("x"), "Comment cannot be empty");
        let long = CommentBody { content: "c".repeat(1001) }.validate().unwrap_err();
        assert_eq!(long.user_message("x"), "Comment too long");
        assert!(CommentBody { content: "Looks good".to_string() }.validate().is_ok());
    }

    #[test]
    fn attachment_size_limit() {
        let at_limit = AttachmentUpload {
            file_name: "a.bin".to_string(),
            mime_type: None,
            bytes: vec![0; MAX_ATTACHMENT_BYTES],
        };
        assert!(at_limit.validate().is_ok());

        let over = AttachmentUpload {
            file_name: "big.bin".to_string(),
            mime_type: None,
            bytes: vec![0; MAX_ATTACHMENT_BYTES + 1],
        };
        let err = over.validate().unwrap_err();
        assert_eq!(err.user_message("x"), "File big.bin is too large (max 10MB)");
    }
}
