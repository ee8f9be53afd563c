//! Wire types served by the mock server.
//!
//! Defined independently of `tasker-core`; the integration tests in the core
//! crate fail if the two drift apart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Archived,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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
    pub metadata: Option<Value>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, TodoStatus::Draft | TodoStatus::Active)
            && self.due_date.is_some_and(|due| due < now)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub todo_id: Uuid,
    pub user_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
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

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulatedTodo {
    #[serde(flatten)]
    pub todo: Todo,
    pub category: Option<Category>,
    pub children: Vec<Todo>,
    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStats {
    pub total: u64,
    pub draft: u64,
    pub active: u64,
    pub completed: u64,
    pub archived: u64,
    pub overdue: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    pub response_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: HealthCheck,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub environment: String,
    pub checks: HealthChecks,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoSort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    DueDate,
    Status,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySort {
    #[default]
    CreatedAt,
    UpdatedAt,
    Name,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<TodoSort>,
    pub order: Option<SortOrder>,
    pub search: Option<String>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    pub category_id: Option<Uuid>,
    pub parent_todo_id: Option<Uuid>,
    pub due_from: Option<DateTime<Utc>>,
    pub due_to: Option<DateTime<Utc>>,
    pub overdue: Option<bool>,
    pub completed: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<CategorySort>,
    pub order: Option<SortOrder>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodo {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TodoPriority>,
    pub due_date: Option<DateTime<Utc>>,
    pub parent_todo_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub metadata: Option<Value>,
}

/// `Some(None)` clears a nullable field; `None` leaves it alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodo {
    pub title: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TodoStatus>,
    pub priority: Option<TodoPriority>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub parent_todo_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub metadata: Option<Option<Value>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    pub color: String,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategory {
    pub name: Option<String>,
    pub color: Option<String>,
    #[serde(default, with = "::serde_with::rust::double_option")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CommentInput {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn todo_serializes_camel_case() {
        let now = Utc::now();
        let todo = Todo {
            id: Uuid::nil(),
            user_id: "u".to_string(),
            title: "Test".to_string(),
            description: None,
            status: TodoStatus::Draft,
            priority: TodoPriority::Medium,
            due_date: None,
            completed_at: None,
            parent_todo_id: None,
            category_id: None,
            metadata: None,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["userId"], "u");
        assert_eq!(json["status"], "draft");
        assert!(json["dueDate"].is_null());
    }

    #[test]
    fn update_todo_distinguishes_null_from_absent() {
        let input: UpdateTodo = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(input.description, Some(None));
        assert!(input.due_date.is_none());

        let input: UpdateTodo = serde_json::from_str(r#"{}"#).unwrap();
        assert!(input.description.is_none());
    }

    #[test]
    fn create_todo_rejects_missing_title() {
        let result: Result<CreateTodo, _> = serde_json::from_str(r#"{"priority":"high"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn overdue_ignores_finished_todos() {
        let now = Utc::now();
        let mut todo: Todo = serde_json::from_value(serde_json::json!({
            "id": Uuid::nil(),
            "userId": "u",
            "title": "t",
            "description": null,
            "status": "active",
            "priority": "low",
            "dueDate": "2000-01-01T00:00:00Z",
            "completedAt": null,
            "parentTodoId": null,
            "categoryId": null,
            "metadata": null,
            "sortOrder": 0,
            "createdAt": "2000-01-01T00:00:00Z",
            "updatedAt": "2000-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(todo.is_overdue(now));
        todo.status = TodoStatus::Completed;
        assert!(!todo.is_overdue(now));
    }
}
