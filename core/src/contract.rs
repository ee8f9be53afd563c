//! Declarative contract for every Tasker API operation.
//!
//! # Design
//! `OPERATIONS` is the single table describing each endpoint: path template,
//! method, query and body schemas, the schema expected per response status,
//! and its security requirement. `TodoClient` reads it to build requests and
//! check success statuses; `openapi::generate` reads it to emit the published
//! document. Schemas are referenced through plain function pointers so the
//! table stays `static` while still deriving from the `types` definitions.

use std::fmt;

use schemars::{json_schema, JsonSchema, Schema, SchemaGenerator};
use serde_json::{json, Value};

use crate::http::HttpMethod;
use crate::types::{
    Attachment, AttachmentDownload, Category, CategoryListQuery, Comment, CommentBody,
    CreateCategory, CreateTodo, HealthResponse, Paginated, PopulatedTodo, Todo, TodoListQuery,
    TodoStats, UpdateCategory, UpdateTodo,
};

/// Produces the schema of one request or response shape.
pub type SchemaFn = fn(&mut SchemaGenerator) -> Schema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationId {
    GetTodos,
    CreateTodo,
    GetTodoById,
    UpdateTodo,
    DeleteTodo,
    GetTodoStats,
    UploadTodoAttachment,
    DeleteTodoAttachment,
    GetAttachmentPresignedUrl,
    GetCategories,
    CreateCategory,
    GetCategoryById,
    UpdateCategory,
    DeleteCategory,
    AddComment,
    GetCommentsByTodoId,
    UpdateComment,
    DeleteComment,
    GetHealth,
}

impl OperationId {
    /// Every operation, in table order.
    pub const ALL: [OperationId; 19] = [
        OperationId::GetTodos,
        OperationId::CreateTodo,
        OperationId::GetTodoById,
        OperationId::UpdateTodo,
        OperationId::DeleteTodo,
        OperationId::GetTodoStats,
        OperationId::UploadTodoAttachment,
        OperationId::DeleteTodoAttachment,
        OperationId::GetAttachmentPresignedUrl,
        OperationId::GetCategories,
        OperationId::CreateCategory,
        OperationId::GetCategoryById,
        OperationId::UpdateCategory,
        OperationId::DeleteCategory,
        OperationId::AddComment,
        OperationId::GetCommentsByTodoId,
        OperationId::UpdateComment,
        OperationId::DeleteComment,
        OperationId::GetHealth,
    ];

    /// Published `operationId`.
    pub fn name(self) -> &'static str {
        match self {
            OperationId::GetTodos => "getTodos",
            OperationId::CreateTodo => "createTodo",
            OperationId::GetTodoById => "getTodoById",
            OperationId::UpdateTodo => "updateTodo",
            OperationId::DeleteTodo => "deleteTodo",
            OperationId::GetTodoStats => "getTodoStats",
            OperationId::UploadTodoAttachment => "uploadTodoAttachment",
            OperationId::DeleteTodoAttachment => "deleteTodoAttachment",
            OperationId::GetAttachmentPresignedUrl => "getAttachmentPresignedURL",
            OperationId::GetCategories => "getCategories",
            OperationId::CreateCategory => "createCategory",
            OperationId::GetCategoryById => "getCategoryById",
            OperationId::UpdateCategory => "updateCategory",
            OperationId::DeleteCategory => "deleteCategory",
            OperationId::AddComment => "addComment",
            OperationId::GetCommentsByTodoId => "getCommentsByTodoId",
            OperationId::UpdateComment => "updateComment",
            OperationId::DeleteComment => "deleteComment",
            OperationId::GetHealth => "getHealth",
        }
    }

    pub fn operation(self) -> &'static Operation {
        &OPERATIONS[self as usize]
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resource group, published as the OpenAPI tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Todo,
    Category,
    Comment,
    Health,
}

impl Resource {
    pub fn name(self) -> &'static str {
        match self {
            Resource::Todo => "Todo",
            Resource::Category => "Category",
            Resource::Comment => "Comment",
            Resource::Health => "Health",
        }
    }
}

/// Security requirement attached to an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Security {
    /// `Authorization: Bearer <jwt>` issued by the identity provider.
    Bearer,
    /// `x-service-token` header for machine-to-machine callers.
    Service,
}

impl Security {
    /// Name of the matching entry in `components.securitySchemes`.
    pub fn scheme_name(self) -> &'static str {
        match self {
            Security::Bearer => "bearerAuth",
            Security::Service => "x-service-token",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Multipart,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Multipart => "multipart/form-data",
        }
    }
}

#[derive(Clone, Copy)]
pub struct RequestBodySpec {
    pub content_type: ContentType,
    pub schema: SchemaFn,
}

/// What a response status carries.
#[derive(Clone, Copy)]
pub enum ResponseBody {
    /// No body, as for `204 No Content`.
    Empty,
    Schema(SchemaFn),
}

pub struct Operation {
    pub id: OperationId,
    pub resource: Resource,
    pub summary: &'static str,
    pub description: &'static str,
    pub method: HttpMethod,
    /// Path template with `:name` placeholders, e.g. `/v1/todos/:id`.
    pub path: &'static str,
    pub query: Option<SchemaFn>,
    pub body: Option<RequestBodySpec>,
    pub responses: &'static [(u16, ResponseBody)],
    pub security: Option<Security>,
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Operation {
    /// The one 2xx status this operation answers with on success.
    pub fn success_status(&self) -> u16 {
        self.responses
            .iter()
            .map(|(status, _)| *status)
            .find(|status| (200..300).contains(status))
            .unwrap_or(200)
    }

    /// Names of the `:param` placeholders, in path order.
    pub fn path_params(&self) -> Vec<&'static str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
            .collect()
    }

    /// Substitute placeholders positionally.
    pub fn render_path(&self, values: &[&str]) -> String {
        let mut values = values.iter();
        self.path
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(_) => values.next().copied().unwrap_or(segment),
                None => segment,
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Path in OpenAPI form: `/v1/todos/{id}`.
    pub fn openapi_path(&self) -> String {
        self.path
            .split('/')
            .map(|segment| match segment.strip_prefix(':') {
                Some(name) => format!("{{{name}}}"),
                None => segment.to_string(),
            })
            .collect::<Vec<_>>()
            .join("/")
    }
}

// ---------------------------------------------------------------------------
// Schema helpers
// ---------------------------------------------------------------------------

fn referenced<T: JsonSchema>(generator: &mut SchemaGenerator) -> Schema {
    generator.subschema_for::<T>()
}

fn inline<T: JsonSchema>(generator: &mut SchemaGenerator) -> Schema {
    T::json_schema(generator)
}

/// Placeholder schema for a multipart file field. The schema layer cannot
/// express binary parts, so the OpenAPI emitter rewrites it to
/// `{"type":"string","format":"binary"}`.
pub fn file_sentinel() -> Value {
    json!({
        "type": "object",
        "properties": { "type": { "type": "string", "enum": ["file"] } },
        "required": ["type"]
    })
}

fn upload_body(_: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "properties": { "file": file_sentinel() },
        "required": ["file"]
    })
}

// ---------------------------------------------------------------------------
// Operation table
// ---------------------------------------------------------------------------

const BEARER: Option<Security> = Some(Security::Bearer);

const fn json_body(schema: SchemaFn) -> Option<RequestBodySpec> {
    Some(RequestBodySpec {
        content_type: ContentType::Json,
        schema,
    })
}

/// Indexed by `OperationId as usize`.
pub static OPERATIONS: [Operation; 19] = [
    Operation {
        id: OperationId::GetTodos,
        resource: Resource::Todo,
        summary: "Get all todos",
        description: "Get all todos",
        method: HttpMethod::Get,
        path: "/v1/todos",
        query: Some(inline::<TodoListQuery>),
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<Paginated<PopulatedTodo>>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::CreateTodo,
        resource: Resource::Todo,
        summary: "Create a new todo",
        description: "Create a new todo",
        method: HttpMethod::Post,
        path: "/v1/todos",
        query: None,
        body: json_body(referenced::<CreateTodo>),
        responses: &[(201, ResponseBody::Schema(referenced::<Todo>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetTodoById,
        resource: Resource::Todo,
        summary: "Get todo by ID",
        description: "Get todo by ID",
        method: HttpMethod::Get,
        path: "/v1/todos/:id",
        query: None,
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<PopulatedTodo>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::UpdateTodo,
        resource: Resource::Todo,
        summary: "Update todo",
        description: "Update todo",
        method: HttpMethod::Patch,
        path: "/v1/todos/:id",
        query: None,
        body: json_body(referenced::<UpdateTodo>),
        responses: &[(200, ResponseBody::Schema(referenced::<Todo>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::DeleteTodo,
        resource: Resource::Todo,
        summary: "Delete todo",
        description: "Delete todo",
        method: HttpMethod::Delete,
        path: "/v1/todos/:id",
        query: None,
        body: None,
        responses: &[(204, ResponseBody::Empty)],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetTodoStats,
        resource: Resource::Todo,
        summary: "Get todo statistics",
        description: "Get todo statistics",
        method: HttpMethod::Get,
        path: "/v1/todos/stats",
        query: None,
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<TodoStats>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::UploadTodoAttachment,
        resource: Resource::Todo,
        summary: "Upload attachment to todo",
        description: "Upload a file attachment to a todo",
        method: HttpMethod::Post,
        path: "/v1/todos/:id/attachments",
        query: None,
        body: Some(RequestBodySpec {
            content_type: ContentType::Multipart,
            schema: upload_body,
        }),
        responses: &[(201, ResponseBody::Schema(referenced::<Attachment>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::DeleteTodoAttachment,
        resource: Resource::Todo,
        summary: "Delete todo attachment",
        description: "Delete a file attachment from a todo",
        method: HttpMethod::Delete,
        path: "/v1/todos/:id/attachments/:attachmentId",
        query: None,
        body: None,
        responses: &[(204, ResponseBody::Empty)],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetAttachmentPresignedUrl,
        resource: Resource::Todo,
        summary: "Get attachment download URL",
        description: "Get a presigned URL to download an attachment",
        method: HttpMethod::Get,
        path: "/v1/todos/:id/attachments/:attachmentId/download",
        query: None,
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<AttachmentDownload>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetCategories,
        resource: Resource::Category,
        summary: "Get all categories",
        description: "Get all categories",
        method: HttpMethod::Get,
        path: "/v1/categories",
        query: Some(inline::<CategoryListQuery>),
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<Paginated<Category>>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::CreateCategory,
        resource: Resource::Category,
        summary: "Create a new category",
        description: "Create a new category",
        method: HttpMethod::Post,
        path: "/v1/categories",
        query: None,
        body: json_body(referenced::<CreateCategory>),
        responses: &[(201, ResponseBody::Schema(referenced::<Category>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetCategoryById,
        resource: Resource::Category,
        summary: "Get category by ID",
        description: "Get category by ID",
        method: HttpMethod::Get,
        path: "/v1/categories/:id",
        query: None,
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<Category>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::UpdateCategory,
        resource: Resource::Category,
        summary: "Update category",
        description: "Update category",
        method: HttpMethod::Patch,
        path: "/v1/categories/:id",
        query: None,
        body: json_body(referenced::<UpdateCategory>),
        responses: &[(200, ResponseBody::Schema(referenced::<Category>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::DeleteCategory,
        resource: Resource::Category,
        summary: "Delete category",
        description: "Delete category",
        method: HttpMethod::Delete,
        path: "/v1/categories/:id",
        query: None,
        body: None,
        responses: &[(204, ResponseBody::Empty)],
        security: BEARER,
    },
    Operation {
        id: OperationId::AddComment,
        resource: Resource::Comment,
        summary: "Add comment to todo",
        description: "Add comment to todo",
        method: HttpMethod::Post,
        path: "/v1/todos/:id/comments",
        query: None,
        body: json_body(referenced::<CommentBody>),
        responses: &[(201, ResponseBody::Schema(referenced::<Comment>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetCommentsByTodoId,
        resource: Resource::Comment,
        summary: "Get comments for todo",
        description: "Get comments for todo",
        method: HttpMethod::Get,
        path: "/v1/todos/:id/comments",
        query: None,
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<Vec<Comment>>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::UpdateComment,
        resource: Resource::Comment,
        summary: "Update comment",
        description: "Update comment",
        method: HttpMethod::Patch,
        path: "/v1/comments/:id",
        query: None,
        body: json_body(referenced::<CommentBody>),
        responses: &[(200, ResponseBody::Schema(referenced::<Comment>))],
        security: BEARER,
    },
    Operation {
        id: OperationId::DeleteComment,
        resource: Resource::Comment,
        summary: "Delete comment",
        description: "Delete comment",
        method: HttpMethod::Delete,
        path: "/v1/comments/:id",
        query: None,
        body: None,
        responses: &[(204, ResponseBody::Empty)],
        security: BEARER,
    },
    Operation {
        id: OperationId::GetHealth,
        resource: Resource::Health,
        summary: "Get health",
        description: "Get health status",
        method: HttpMethod::Get,
        path: "/status",
        query: None,
        body: None,
        responses: &[(200, ResponseBody::Schema(referenced::<HealthResponse>))],
        security: None,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_operation_id() {
        for (index, id) in OperationId::ALL.iter().enumerate() {
            assert_eq!(OPERATIONS[index].id, *id, "row {index}");
            assert_eq!(id.operation().id, *id);
        }
    }

    #[test]
    fn every_operation_has_exactly_one_success_status() {
        for op in &OPERATIONS {
            let successes = op
                .responses
                .iter()
                .filter(|(status, _)| (200..300).contains(status))
                .count();
            assert_eq!(successes, 1, "{}", op.id);
        }
    }

    #[test]
    fn deletes_answer_204_with_no_body() {
        for op in OPERATIONS.iter().filter(|op| op.method == HttpMethod::Delete) {
            assert_eq!(op.success_status(), 204, "{}", op.id);
            assert!(op.body.is_none(), "{}", op.id);
            assert!(matches!(op.responses[0].1, ResponseBody::Empty), "{}", op.id);
        }
    }

    #[test]
    fn only_health_is_public() {
        for op in &OPERATIONS {
            if op.id == OperationId::GetHealth {
                assert!(op.security.is_none());
            } else {
                assert_eq!(op.security, Some(Security::Bearer), "{}", op.id);
            }
        }
    }

    #[test]
    fn versioned_paths() {
        for op in OPERATIONS.iter().filter(|op| op.resource != Resource::Health) {
            assert!(op.path.starts_with("/v1/"), "{}", op.id);
        }
    }

    #[test]
    fn path_rendering() {
        let op = OperationId::DeleteTodoAttachment.operation();
        assert_eq!(op.path_params(), vec!["id", "attachmentId"]);
        assert_eq!(op.render_path(&["t1", "a1"]), "/v1/todos/t1/attachments/a1");
        assert_eq!(op.openapi_path(), "/v1/todos/{id}/attachments/{attachmentId}");
    }

    #[test]
    fn upload_is_multipart() {
        let op = OperationId::UploadTodoAttachment.operation();
        let body = op.body.as_ref().map(|b| b.content_type);
        assert_eq!(body, Some(ContentType::Multipart));
    }
}
