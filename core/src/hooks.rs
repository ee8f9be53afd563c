//! Cached reads and invalidating writes over the API client.
//!
//! # Overview
//! `QueryClient` is the surface a UI consumes. Reads go through the shared
//! `QueryCache` under one key per operation and parameters; writes call the
//! API and, only on success, apply their `Mutation` invalidations.
//!
//! # Design
//! - Reads taking an id accept `Option<Uuid>`; `None` means "not enabled yet"
//!   and returns `Ok(None)` without a request.
//! - `peek_*` methods return whatever is cached, or the placeholder shape a
//!   list renders before its first response.
//! - Failures are logged with the user-facing message (the body's `message`,
//!   else a per-operation fallback) and returned to the caller.

use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::api::{ApiClient, TokenProvider};
use crate::cache::{QueryCache, QueryKey, QueryScope};
use crate::client::{encode_query, TodoClient};
use crate::error::ApiError;
use crate::invalidation::{recover_comment_parent, Mutation};
use crate::transport::Transport;
use crate::types::{
    Attachment, AttachmentDownload, AttachmentUpload, Category, CategoryListQuery, Comment,
    CommentBody, CreateCategory, CreateTodo, HealthResponse, Paginated, PopulatedTodo, Todo,
    TodoListQuery, TodoStats, UpdateCategory, UpdateTodo,
};

/// Page size of the todo list placeholder.
pub const TODO_PLACEHOLDER_LIMIT: u32 = 20;
/// Page size of the category list placeholder.
pub const CATEGORY_PLACEHOLDER_LIMIT: u32 = 50;

pub struct QueryClient<T, P> {
    client: TodoClient,
    api: ApiClient<T, P>,
    cache: Arc<QueryCache>,
}

impl<T: Transport, P: TokenProvider> QueryClient<T, P> {
    pub fn new(client: TodoClient, api: ApiClient<T, P>, cache: Arc<QueryCache>) -> Self {
        Self { client, api, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient<T, P> {
        &self.api
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn todos(&self, query: &TodoListQuery) -> Result<Paginated<PopulatedTodo>, ApiError> {
        let request = self.client.build_list_todos(query)?;
        let key = list_key(QueryScope::AllTodos, query)?;
        self.cache
            .fetch(&key, || self.client.parse_list_todos(self.api.execute(&request)))
    }

    pub fn todo(&self, id: Option<Uuid>) -> Result<Option<PopulatedTodo>, ApiError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let key = QueryKey::with_param(QueryScope::TodoById, id.to_string());
        self.cache
            .fetch(&key, || {
                let request = self.client.build_get_todo(id);
                self.client.parse_get_todo(self.api.execute(&request))
            })
            .map(Some)
    }

    pub fn todo_stats(&self) -> Result<TodoStats, ApiError> {
        let key = QueryKey::new(QueryScope::TodoStats);
        self.cache.fetch(&key, || {
            let request = self.client.build_todo_stats();
            self.client.parse_todo_stats(self.api.execute(&request))
        })
    }

    pub fn categories(&self, query: &CategoryListQuery) -> Result<Paginated<Category>, ApiError> {
        let request = self.client.build_list_categories(query)?;
        let key = list_key(QueryScope::AllCategories, query)?;
        self.cache
            .fetch(&key, || self.client.parse_list_categories(self.api.execute(&request)))
    }

    pub fn category(&self, id: Option<Uuid>) -> Result<Option<Category>, ApiError> {
        let Some(id) = id else {
            return Ok(None);
        };
        let key = QueryKey::with_param(QueryScope::CategoryById, id.to_string());
        self.cache
            .fetch(&key, || {
                let request = self.client.build_get_category(id);
                self.client.parse_get_category(self.api.execute(&request))
            })
            .map(Some)
    }

    pub fn comments(&self, todo_id: Option<Uuid>) -> Result<Option<Vec<Comment>>, ApiError> {
        let Some(todo_id) = todo_id else {
            return Ok(None);
        };
        let key = QueryKey::with_param(QueryScope::CommentsByTodoId, todo_id.to_string());
        self.cache
            .fetch(&key, || {
                let request = self.client.build_list_comments(todo_id);
                self.client.parse_list_comments(self.api.execute(&request))
            })
            .map(Some)
    }

    /// Health probe. Never cached.
    pub fn health(&self) -> Result<HealthResponse, ApiError> {
        let request = self.client.build_health();
        self.client.parse_health(self.api.execute(&request))
    }

    // -----------------------------------------------------------------------
    // Placeholders
    // -----------------------------------------------------------------------

    pub fn peek_todos(&self, query: &TodoListQuery) -> Paginated<PopulatedTodo> {
        self.peek(list_key(QueryScope::AllTodos, query).ok())
            .unwrap_or_else(|| Paginated::placeholder(TODO_PLACEHOLDER_LIMIT))
    }

    pub fn peek_categories(&self, query: &CategoryListQuery) -> Paginated<Category> {
        self.peek(list_key(QueryScope::AllCategories, query).ok())
            .unwrap_or_else(|| Paginated::placeholder(CATEGORY_PLACEHOLDER_LIMIT))
    }

    pub fn peek_todo_stats(&self) -> TodoStats {
        self.peek(Some(QueryKey::new(QueryScope::TodoStats)))
            .unwrap_or_default()
    }

    pub fn peek_comments(&self, todo_id: Uuid) -> Vec<Comment> {
        self.peek(Some(QueryKey::with_param(
            QueryScope::CommentsByTodoId,
            todo_id.to_string(),
        )))
        .unwrap_or_default()
    }

    fn peek<D: serde::de::DeserializeOwned>(&self, key: Option<QueryKey>) -> Option<D> {
        let data = self.cache.get(&key?)?;
        serde_json::from_value(data).ok()
    }

    // -----------------------------------------------------------------------
    // Todo writes
    // -----------------------------------------------------------------------

    pub fn create_todo(&self, input: &CreateTodo) -> Result<Todo, ApiError> {
        let result = self
            .client
            .build_create_todo(input)
            .and_then(|request| self.client.parse_create_todo(self.api.execute(&request)));
        self.settle(result, "Failed to create todo", |_| Some(Mutation::CreateTodo))
    }

    pub fn update_todo(&self, id: Uuid, input: &UpdateTodo) -> Result<Todo, ApiError> {
        let result = self
            .client
            .build_update_todo(id, input)
            .and_then(|request| self.client.parse_update_todo(self.api.execute(&request)));
        self.settle(result, "Failed to update todo", |_| {
            Some(Mutation::UpdateTodo { id })
        })
    }

    pub fn delete_todo(&self, id: Uuid) -> Result<(), ApiError> {
        let request = self.client.build_delete_todo(id);
        let result = self.client.parse_delete_todo(self.api.execute(&request));
        self.settle(result, "Failed to delete todo", |_| {
            Some(Mutation::DeleteTodo { id })
        })
    }

    /// Rejects files over the size limit before any request is made.
    pub fn upload_attachment(
        &self,
        todo_id: Uuid,
        upload: &AttachmentUpload,
    ) -> Result<Attachment, ApiError> {
        let result = self
            .client
            .build_upload_attachment(todo_id, upload)
            .and_then(|request| {
                self.client
                    .parse_upload_attachment(self.api.execute(&request))
            });
        self.settle(result, "Failed to upload attachment", |_| {
            Some(Mutation::UploadAttachment { todo_id })
        })
    }

    pub fn delete_attachment(&self, todo_id: Uuid, attachment_id: Uuid) -> Result<(), ApiError> {
        let request = self.client.build_delete_attachment(todo_id, attachment_id);
        let result = self
            .client
            .parse_delete_attachment(self.api.execute(&request));
        self.settle(result, "Failed to delete attachment", |_| {
            Some(Mutation::DeleteAttachment { todo_id })
        })
    }

    /// Presigned download link. Invalidates nothing.
    pub fn attachment_download_url(
        &self,
        todo_id: Uuid,
        attachment_id: Uuid,
    ) -> Result<AttachmentDownload, ApiError> {
        let request = self
            .client
            .build_attachment_download_url(todo_id, attachment_id);
        let result = self
            .client
            .parse_attachment_download_url(self.api.execute(&request));
        self.settle(result, "Failed to get download link", |_| None)
    }

    // -----------------------------------------------------------------------
    // Category writes
    // -----------------------------------------------------------------------

    pub fn create_category(&self, input: &CreateCategory) -> Result<Category, ApiError> {
        let result = self
            .client
            .build_create_category(input)
            .and_then(|request| self.client.parse_create_category(self.api.execute(&request)));
        self.settle(result, "Failed to create category", |_| {
            Some(Mutation::CreateCategory)
        })
    }

    pub fn update_category(&self, id: Uuid, input: &UpdateCategory) -> Result<Category, ApiError> {
        let result = self
            .client
            .build_update_category(id, input)
            .and_then(|request| self.client.parse_update_category(self.api.execute(&request)));
        self.settle(result, "Failed to update category", |_| {
            Some(Mutation::UpdateCategory { id })
        })
    }

    pub fn delete_category(&self, id: Uuid) -> Result<(), ApiError> {
        let request = self.client.build_delete_category(id);
        let result = self.client.parse_delete_category(self.api.execute(&request));
        self.settle(result, "Failed to delete category", |_| {
            Some(Mutation::DeleteCategory { id })
        })
    }

    // -----------------------------------------------------------------------
    // Comment writes
    // -----------------------------------------------------------------------

    pub fn add_comment(&self, todo_id: Uuid, input: &CommentBody) -> Result<Comment, ApiError> {
        let result = self
            .client
            .build_add_comment(todo_id, input)
            .and_then(|request| self.client.parse_add_comment(self.api.execute(&request)));
        self.settle(result, "Failed to add comment", |_| {
            Some(Mutation::AddComment { todo_id })
        })
    }

    pub fn update_comment(&self, comment_id: Uuid, input: &CommentBody) -> Result<Comment, ApiError> {
        let result = self
            .client
            .build_update_comment(comment_id, input)
            .and_then(|request| self.client.parse_update_comment(self.api.execute(&request)));
        self.settle(result, "Failed to update comment", |comment| {
            Some(Mutation::UpdateComment {
                todo_id: comment.todo_id,
            })
        })
    }

    /// The parent todo is looked up in cached comment lists before the
    /// request; if none holds the comment only the todo lists are invalidated.
    pub fn delete_comment(&self, comment_id: Uuid) -> Result<(), ApiError> {
        let todo_id = recover_comment_parent(&self.cache, comment_id);
        let request = self.client.build_delete_comment(comment_id);
        let result = self.client.parse_delete_comment(self.api.execute(&request));
        self.settle(result, "Failed to delete comment", |_| {
            Some(Mutation::DeleteComment { todo_id })
        })
    }

    fn settle<R>(
        &self,
        result: Result<R, ApiError>,
        fallback: &str,
        mutation: impl FnOnce(&R) -> Option<Mutation>,
    ) -> Result<R, ApiError> {
        match result {
            Ok(value) => {
                if let Some(mutation) = mutation(&value) {
                    let marked = mutation.apply(&self.cache);
                    debug!(?mutation, marked, "applied invalidations");
                }
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "{}", err.user_message(fallback));
                Err(err)
            }
        }
    }
}

fn list_key<Q: serde::Serialize>(scope: QueryScope, query: &Q) -> Result<QueryKey, ApiError> {
    Ok(match encode_query(query)? {
        Some(encoded) => QueryKey::with_param(scope, encoded),
        None => QueryKey::new(scope),
    })
}
