//! Stateless HTTP request builder and response parser for the Tasker API.
//!
//! # Design
//! `TodoClient` holds only a `base_url` and carries no mutable state between
//! calls. Each operation in the contract table is split into a `build_*`
//! method that produces an `HttpRequest` and a `parse_*` method that consumes
//! an `HttpResponse`. Paths, methods, content types and success statuses all
//! come from `contract::OPERATIONS`; the methods here only add typing.
//!
//! Request values are validated in `build_*`, so a rejected form never
//! produces a request.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::contract::{ContentType, OperationId};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{
    Attachment, AttachmentDownload, AttachmentUpload, Category, CategoryListQuery, Comment,
    CommentBody, CreateCategory, CreateTodo, HealthResponse, Paginated, PopulatedTodo, Todo,
    TodoListQuery, TodoStats, UpdateCategory, UpdateTodo, Validate,
};

/// Mount point of the API under the configured base URL.
pub const API_PREFIX: &str = "/api";

/// Synchronous, stateless client for the Tasker API.
#[derive(Debug, Clone)]
pub struct TodoClient {
    base_url: String,
}

impl TodoClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Todos
    // -----------------------------------------------------------------------

    pub fn build_list_todos(&self, query: &TodoListQuery) -> Result<HttpRequest, ApiError> {
        query.validate()?;
        let mut req = self.request(OperationId::GetTodos, &[]);
        append_query(&mut req, query)?;
        Ok(req)
    }

    pub fn build_create_todo(&self, input: &CreateTodo) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json_request(OperationId::CreateTodo, &[], input)
    }

    pub fn build_get_todo(&self, id: Uuid) -> HttpRequest {
        self.request(OperationId::GetTodoById, &[&id.to_string()])
    }

    pub fn build_update_todo(&self, id: Uuid, input: &UpdateTodo) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json_request(OperationId::UpdateTodo, &[&id.to_string()], input)
    }

    pub fn build_delete_todo(&self, id: Uuid) -> HttpRequest {
        self.request(OperationId::DeleteTodo, &[&id.to_string()])
    }

    pub fn build_todo_stats(&self) -> HttpRequest {
        self.request(OperationId::GetTodoStats, &[])
    }

    pub fn build_upload_attachment(
        &self,
        todo_id: Uuid,
        upload: &AttachmentUpload,
    ) -> Result<HttpRequest, ApiError> {
        upload.validate()?;
        let mut req = self.request(OperationId::UploadTodoAttachment, &[&todo_id.to_string()]);
        let boundary = format!("tasker-{}", Uuid::new_v4().simple());
        req.set_header(
            "content-type",
            format!("{}; boundary={boundary}", ContentType::Multipart.as_str()),
        );
        req.body = Some(encode_multipart(&boundary, upload));
        Ok(req)
    }

    pub fn build_delete_attachment(&self, todo_id: Uuid, attachment_id: Uuid) -> HttpRequest {
        self.request(
            OperationId::DeleteTodoAttachment,
            &[&todo_id.to_string(), &attachment_id.to_string()],
        )
    }

    pub fn build_attachment_download_url(&self, todo_id: Uuid, attachment_id: Uuid) -> HttpRequest {
        self.request(
            OperationId::GetAttachmentPresignedUrl,
            &[&todo_id.to_string(), &attachment_id.to_string()],
        )
    }

    pub fn parse_list_todos(&self, response: HttpResponse) -> Result<Paginated<PopulatedTodo>, ApiError> {
        parse_json(OperationId::GetTodos, response)
    }

    pub fn parse_create_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(OperationId::CreateTodo, response)
    }

    pub fn parse_get_todo(&self, response: HttpResponse) -> Result<PopulatedTodo, ApiError> {
        parse_json(OperationId::GetTodoById, response)
    }

    pub fn parse_update_todo(&self, response: HttpResponse) -> Result<Todo, ApiError> {
        parse_json(OperationId::UpdateTodo, response)
    }

    pub fn parse_delete_todo(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(OperationId::DeleteTodo, response)
    }

    pub fn parse_todo_stats(&self, response: HttpResponse) -> Result<TodoStats, ApiError> {
        parse_json(OperationId::GetTodoStats, response)
    }

    pub fn parse_upload_attachment(&self, response: HttpResponse) -> Result<Attachment, ApiError> {
        parse_json(OperationId::UploadTodoAttachment, response)
    }

    pub fn parse_delete_attachment(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(OperationId::DeleteTodoAttachment, response)
    }

    pub fn parse_attachment_download_url(
        &self,
        response: HttpResponse,
    ) -> Result<AttachmentDownload, ApiError> {
        parse_json(OperationId::GetAttachmentPresignedUrl, response)
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    pub fn build_list_categories(&self, query: &CategoryListQuery) -> Result<HttpRequest, ApiError> {
        query.validate()?;
        let mut req = self.request(OperationId::GetCategories, &[]);
        append_query(&mut req, query)?;
        Ok(req)
    }

    pub fn build_create_category(&self, input: &CreateCategory) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json_request(OperationId::CreateCategory, &[], input)
    }

    pub fn build_get_category(&self, id: Uuid) -> HttpRequest {
        self.request(OperationId::GetCategoryById, &[&id.to_string()])
    }

    pub fn build_update_category(
        &self,
        id: Uuid,
        input: &UpdateCategory,
    ) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json_request(OperationId::UpdateCategory, &[&id.to_string()], input)
    }

    pub fn build_delete_category(&self, id: Uuid) -> HttpRequest {
        self.request(OperationId::DeleteCategory, &[&id.to_string()])
    }

    pub fn parse_list_categories(&self, response: HttpResponse) -> Result<Paginated<Category>, ApiError> {
        parse_json(OperationId::GetCategories, response)
    }

    pub fn parse_create_category(&self, response: HttpResponse) -> Result<Category, ApiError> {
        parse_json(OperationId::CreateCategory, response)
    }

    pub fn parse_get_category(&self, response: HttpResponse) -> Result<Category, ApiError> {
        parse_json(OperationId::GetCategoryById, response)
    }

    pub fn parse_update_category(&self, response: HttpResponse) -> Result<Category, ApiError> {
        parse_json(OperationId::UpdateCategory, response)
    }

    pub fn parse_delete_category(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(OperationId::DeleteCategory, response)
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub fn build_add_comment(&self, todo_id: Uuid, input: &CommentBody) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json_request(OperationId::AddComment, &[&todo_id.to_string()], input)
    }

    pub fn build_list_comments(&self, todo_id: Uuid) -> HttpRequest {
        self.request(OperationId::GetCommentsByTodoId, &[&todo_id.to_string()])
    }

    pub fn build_update_comment(
        &self,
        comment_id: Uuid,
        input: &CommentBody,
    ) -> Result<HttpRequest, ApiError> {
        input.validate()?;
        self.json_request(OperationId::UpdateComment, &[&comment_id.to_string()], input)
    }

    pub fn build_delete_comment(&self, comment_id: Uuid) -> HttpRequest {
        self.request(OperationId::DeleteComment, &[&comment_id.to_string()])
    }

    pub fn parse_add_comment(&self, response: HttpResponse) -> Result<Comment, ApiError> {
        parse_json(OperationId::AddComment, response)
    }

    pub fn parse_list_comments(&self, response: HttpResponse) -> Result<Vec<Comment>, ApiError> {
        parse_json(OperationId::GetCommentsByTodoId, response)
    }

    pub fn parse_update_comment(&self, response: HttpResponse) -> Result<Comment, ApiError> {
        parse_json(OperationId::UpdateComment, response)
    }

    pub fn parse_delete_comment(&self, response: HttpResponse) -> Result<(), ApiError> {
        parse_empty(OperationId::DeleteComment, response)
    }

    // -----------------------------------------------------------------------
    // Health
    // -----------------------------------------------------------------------

    pub fn build_health(&self) -> HttpRequest {
        self.request(OperationId::GetHealth, &[])
    }

    pub fn parse_health(&self, response: HttpResponse) -> Result<HealthResponse, ApiError> {
        parse_json(OperationId::GetHealth, response)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Bare request for `id` with the JSON base header and no body.
    fn request(&self, id: OperationId, params: &[&str]) -> HttpRequest {
        let op = id.operation();
        HttpRequest {
            method: op.method,
            path: format!("{}{API_PREFIX}{}", self.base_url, op.render_path(params)),
            headers: vec![(
                "content-type".to_string(),
                ContentType::Json.as_str().to_string(),
            )],
            body: None,
        }
    }

    fn json_request<T: Serialize>(
        &self,
        id: OperationId,
        params: &[&str],
        input: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_vec(input).map_err(|e| ApiError::Serialization(e.to_string()))?;
        let mut req = self.request(id, params);
        req.body = Some(body);
        Ok(req)
    }
}

/// Check the status against the operation's success status.
fn check_status(id: OperationId, response: &HttpResponse) -> Result<(), ApiError> {
    if response.status == id.operation().success_status() {
        return Ok(());
    }
    Err(ApiError::from_response(response.status, &response.body))
}

fn parse_json<T: DeserializeOwned>(id: OperationId, response: HttpResponse) -> Result<T, ApiError> {
    check_status(id, &response)?;
    serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

fn parse_empty(id: OperationId, response: HttpResponse) -> Result<(), ApiError> {
    check_status(id, &response)
}

/// Serialize `query` into a URL query string, skipping unset fields.
pub fn encode_query<T: Serialize>(query: &T) -> Result<Option<String>, ApiError> {
    let value = serde_json::to_value(query).map_err(|e| ApiError::Serialization(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(ApiError::Serialization("query must serialize to an object".to_string()));
    };
    if fields.is_empty() {
        return Ok(None);
    }
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in &fields {
        match value {
            Value::Null => {}
            Value::String(s) => {
                serializer.append_pair(key, s);
            }
            other => {
                serializer.append_pair(key, &other.to_string());
            }
        }
    }
    Ok(Some(serializer.finish()))
}

fn append_query<T: Serialize>(req: &mut HttpRequest, query: &T) -> Result<(), ApiError> {
    if let Some(qs) = encode_query(query)? {
        req.path.push('?');
        req.path.push_str(&qs);
    }
    Ok(())
}

/// Encode a single-file `multipart/form-data` body with a `file` part.
fn encode_multipart(boundary: &str, upload: &AttachmentUpload) -> Vec<u8> {
    let mime = upload.mime_type.as_deref().unwrap_or("application/octet-stream");
    let file_name = upload
        .file_name
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A");
    let mut body = Vec::with_capacity(upload.bytes.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
    body.extend_from_slice(&upload.bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use crate::types::{TodoPriority, TodoSortField, TodoStatus, MAX_ATTACHMENT_BYTES};

    const TODO_JSON: &str = r#"{"id":"00000000-0000-0000-0000-000000000001","userId":"user_1","title":"New","description":null,"status":"draft","priority":"medium","dueDate":null,"completedAt":null,"parentTodoId":null,"categoryId":null,"metadata":null,"sortOrder":0,"createdAt":"2025-01-15T10:00:00Z","updatedAt":"2025-01-15T10:00:00Z"}"#;

    fn client() -> TodoClient {
        TodoClient::new("http://localhost:3000")
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_list_todos_without_filters() {
        let req = client().build_list_todos(&TodoListQuery::default()).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:3000/api/v1/todos");
        assert!(req.body.is_none());
        assert_eq!(req.header("content-type"), Some("application/json"));
    }

    #[test]
    fn build_list_todos_encodes_filters() {
        let query = TodoListQuery {
            page: Some(2),
            limit: Some(10),
            sort: Some(TodoSortField::DueDate),
            search: Some("milk & eggs".to_string()),
            status: Some(TodoStatus::Active),
            overdue: Some(true),
            ..TodoListQuery::default()
        };
        let req = client().build_list_todos(&query).unwrap();
        let (_, qs) = req.path.split_once('?').unwrap();
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(qs.as_bytes())
            .into_owned()
            .collect();
        assert!(pairs.contains(&("page".to_string(), "2".to_string())));
        assert!(pairs.contains(&("limit".to_string(), "10".to_string())));
        assert!(pairs.contains(&("sort".to_string(), "due_date".to_string())));
        assert!(pairs.contains(&("search".to_string(), "milk & eggs".to_string())));
        assert!(pairs.contains(&("status".to_string(), "active".to_string())));
        assert!(pairs.contains(&("overdue".to_string(), "true".to_string())));
    }

    #[test]
    fn build_list_rejects_out_of_range_limit() {
        let query = CategoryListQuery { limit: Some(500), ..Default::default() };
        let err = client().build_list_categories(&query).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn build_create_todo_produces_json_body() {
        let input = CreateTodo {
            title: "Buy milk".to_string(),
            priority: Some(TodoPriority::Medium),
            ..CreateTodo::default()
        };
        let req = client().build_create_todo(&input).unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.path, "http://localhost:3000/api/v1/todos");
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "title": "Buy milk", "priority": "medium" }));
    }

    #[test]
    fn build_update_todo_is_patch_with_partial_body() {
        let input = UpdateTodo {
            title: Some("Updated".to_string()),
            ..UpdateTodo::default()
        };
        let req = client().build_update_todo(Uuid::nil(), &input).unwrap();
        assert_eq!(req.method, HttpMethod::Patch);
        assert_eq!(
            req.path,
            "http://localhost:3000/api/v1/todos/00000000-0000-0000-0000-000000000000"
        );
        let body: Value = serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, serde_json::json!({ "title": "Updated" }));
    }

    #[test]
    fn build_delete_attachment_fills_both_params() {
        let todo = Uuid::from_u128(1);
        let attachment = Uuid::from_u128(2);
        let req = client().build_delete_attachment(todo, attachment);
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(
            req.path,
            format!("http://localhost:3000/api/v1/todos/{todo}/attachments/{attachment}")
        );
    }

    #[test]
    fn build_health_is_unversioned() {
        let req = client().build_health();
        assert_eq!(req.path, "http://localhost:3000/api/status");
    }

    #[test]
    fn build_upload_attachment_is_multipart() {
        let upload = AttachmentUpload {
            file_name: "notes.txt".to_string(),
            mime_type: Some("text/plain".to_string()),
            bytes: b"hello".to_vec(),
        };
        let req = client().build_upload_attachment(Uuid::nil(), &upload).unwrap();
        let content_type = req.header("content-type").unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .unwrap()
            .to_string();
        let body = String::from_utf8(req.body.clone().unwrap()).unwrap();
        assert!(body.starts_with(&format!("--{boundary}\r\n")));
        assert!(body.contains("name=\"file\"; filename=\"notes.txt\""));
        assert!(body.contains("Content-Type: text/plain\r\n\r\nhello\r\n"));
        assert!(body.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn upload_file_name_cannot_break_out_of_its_header() {
        let upload = AttachmentUpload {
            file_name: "a\"b\r\nX-Injected: 1\n.txt".to_string(),
            mime_type: None,
            bytes: b"x".to_vec(),
        };
        let req = client().build_upload_attachment(Uuid::nil(), &upload).unwrap();
        let body = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(body.contains("filename=\"a%22b%0D%0AX-Injected: 1%0A.txt\"\r\n"));
        assert!(!body.contains("\r\nX-Injected"));
        assert!(body.contains("Content-Type: application/octet-stream\r\n\r\nx\r\n"));
    }

    #[test]
    fn build_upload_rejects_oversized_file() {
        let upload = AttachmentUpload {
            file_name: "video.mp4".to_string(),
            mime_type: None,
            bytes: vec![0; MAX_ATTACHMENT_BYTES + 1],
        };
        let err = client().build_upload_attachment(Uuid::nil(), &upload).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn parse_create_todo_requires_201() {
        let todo = client().parse_create_todo(response(201, TODO_JSON)).unwrap();
        assert_eq!(todo.title, "New");

        let err = client().parse_create_todo(response(200, TODO_JSON)).unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn parse_surfaces_error_body() {
        let err = client()
            .parse_get_todo(response(404, r#"{"message":"todo not found"}"#))
            .unwrap_err();
        match err {
            ApiError::Http { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body["message"], "todo not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_delete_accepts_only_204() {
        assert!(client().parse_delete_todo(response(204, "")).is_ok());
        let err = client().parse_delete_todo(response(200, "{}")).unwrap_err();
        assert_eq!(err.status(), Some(200));
    }

    #[test]
    fn parse_list_todos_bad_json() {
        let err = client().parse_list_todos(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let client = TodoClient::new("http://localhost:3000/");
        assert_eq!(client.build_todo_stats().path, "http://localhost:3000/api/v1/todos/stats");
    }

    #[test]
    fn encode_query_skips_empty_struct() {
        assert_eq!(encode_query(&TodoListQuery::default()).unwrap(), None);
    }
}
