//! In-memory data behind the mock API.
//!
//! Every method takes the caller's user id; rows owned by someone else are
//! reported as not found.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Attachment, Category, CategoryQuery, CategorySort, Comment, CreateCategory, CreateTodo,
    Paginated, PopulatedTodo, SortOrder, Todo, TodoQuery, TodoSort, TodoStats, TodoStatus,
    UpdateCategory, UpdateTodo,
};

pub const MAX_TITLE_CHARS: usize = 255;
pub const MAX_CATEGORY_NAME_CHARS: usize = 100;
pub const MAX_CATEGORY_DESCRIPTION_CHARS: usize = 500;
pub const MAX_COMMENT_CHARS: usize = 1000;
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_PAGE_LIMIT: u32 = 100;
pub const DEFAULT_TODO_LIMIT: u32 = 20;
pub const DEFAULT_CATEGORY_LIMIT: u32 = 50;

#[derive(Debug, Default)]
pub struct Store {
    todos: HashMap<Uuid, Todo>,
    categories: HashMap<Uuid, Category>,
    comments: HashMap<Uuid, Comment>,
    attachments: HashMap<Uuid, Attachment>,
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(AppError::BadRequest(format!("{field} is required")));
    }
    if len > max {
        return Err(AppError::BadRequest(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

fn page_bounds(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Result<(u32, u32), AppError> {
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(default_limit);
    if page == 0 {
        return Err(AppError::BadRequest("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {MAX_PAGE_LIMIT}"
        )));
    }
    Ok((page, limit))
}

fn paginate<T>(items: Vec<T>, page: u32, limit: u32) -> Paginated<T> {
    let total = items.len() as u64;
    let skip = (page as usize - 1).saturating_mul(limit as usize);
    Paginated {
        data: items.into_iter().skip(skip).take(limit as usize).collect(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(u64::from(limit)),
    }
}

fn directed(ordering: Ordering, order: SortOrder) -> Ordering {
    match order {
        SortOrder::Asc => ordering,
        SortOrder::Desc => ordering.reverse(),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Todos
    // -----------------------------------------------------------------------

    fn owned_todo(&self, user: &str, id: Uuid) -> Result<&Todo, AppError> {
        self.todos
            .get(&id)
            .filter(|t| t.user_id == user)
            .ok_or(AppError::NotFound("Todo"))
    }

    fn check_parent(&self, user: &str, parent: Option<Uuid>, this: Option<Uuid>) -> Result<(), AppError> {
        let Some(parent) = parent else {
            return Ok(());
        };
        if Some(parent) == this {
            return Err(AppError::BadRequest("A todo cannot be its own parent".to_string()));
        }
        self.owned_todo(user, parent)
            .map(|_| ())
            .map_err(|_| AppError::BadRequest("Parent todo not found".to_string()))
    }

    fn check_category(&self, user: &str, category: Option<Uuid>) -> Result<(), AppError> {
        let Some(category) = category else {
            return Ok(());
        };
        self.owned_category(user, category)
            .map(|_| ())
            .map_err(|_| AppError::BadRequest("Category not found".to_string()))
    }

    pub fn create_todo(&mut self, user: &str, input: CreateTodo) -> Result<Todo, AppError> {
        check_len("title", &input.title, MAX_TITLE_CHARS)?;
        self.check_parent(user, input.parent_todo_id, None)?;
        self.check_category(user, input.category_id)?;

        let now = Utc::now();
        let sort_order = self
            .todos
            .values()
            .filter(|t| t.user_id == user)
            .map(|t| t.sort_order + 1)
            .max()
            .unwrap_or(0);
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            title: input.title,
            description: input.description,
            status: TodoStatus::Draft,
            priority: input.priority.unwrap_or_default(),
            due_date: input.due_date,
            completed_at: None,
            parent_todo_id: input.parent_todo_id,
            category_id: input.category_id,
            metadata: input.metadata,
            sort_order,
            created_at: now,
            updated_at: now,
        };
        self.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    pub fn get_todo(&self, user: &str, id: Uuid) -> Result<PopulatedTodo, AppError> {
        let todo = self.owned_todo(user, id)?;
        Ok(self.populate(todo))
    }

    fn populate(&self, todo: &Todo) -> PopulatedTodo {
        let mut children: Vec<Todo> = self
            .todos
            .values()
            .filter(|t| t.parent_todo_id == Some(todo.id))
            .cloned()
            .collect();
        children.sort_by_key(|t| t.sort_order);

        let mut comments: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| c.todo_id == todo.id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);

        let mut attachments: Vec<Attachment> = self
            .attachments
            .values()
            .filter(|a| a.todo_id == todo.id)
            .cloned()
            .collect();
        attachments.sort_by_key(|a| a.created_at);

        PopulatedTodo {
            todo: todo.clone(),
            category: todo.category_id.and_then(|id| self.categories.get(&id).cloned()),
            children,
            comments,
            attachments,
        }
    }

    pub fn list_todos(&self, user: &str, query: &TodoQuery) -> Result<Paginated<PopulatedTodo>, AppError> {
        let (page, limit) = page_bounds(query.page, query.limit, DEFAULT_TODO_LIMIT)?;
        if let (Some(from), Some(to)) = (query.due_from, query.due_to) {
            if from > to {
                return Err(AppError::BadRequest("dueFrom must not be after dueTo".to_string()));
            }
        }

        let now = Utc::now();
        let mut todos: Vec<&Todo> = self
            .todos
            .values()
            .filter(|t| t.user_id == user)
            .filter(|t| query.status.is_none_or(|s| t.status == s))
            .filter(|t| query.priority.is_none_or(|p| t.priority == p))
            .filter(|t| query.category_id.is_none_or(|c| t.category_id == Some(c)))
            .filter(|t| query.parent_todo_id.is_none_or(|p| t.parent_todo_id == Some(p)))
            .filter(|t| {
                query.search.as_deref().is_none_or(|q| {
                    contains_ci(&t.title, q)
                        || t.description.as_deref().is_some_and(|d| contains_ci(d, q))
                })
            })
            .filter(|t| in_due_window(t.due_date, query.due_from, query.due_to))
            .filter(|t| query.overdue.is_none_or(|o| t.is_overdue(now) == o))
            .filter(|t| {
                query
                    .completed
                    .is_none_or(|c| (t.status == TodoStatus::Completed) == c)
            })
            .collect();

        let sort = query.sort.unwrap_or_default();
        let order = query.order.unwrap_or_default();
        todos.sort_by(|a, b| directed(compare_todos(a, b, sort), order));

        let populated = todos.into_iter().map(|t| self.populate(t)).collect();
        Ok(paginate(populated, page, limit))
    }

    pub fn update_todo(&mut self, user: &str, id: Uuid, input: UpdateTodo) -> Result<Todo, AppError> {
        self.owned_todo(user, id)?;
        if let Some(title) = &input.title {
            check_len("title", title, MAX_TITLE_CHARS)?;
        }
        if let Some(parent) = input.parent_todo_id {
            self.check_parent(user, parent, Some(id))?;
        }
        if let Some(category) = input.category_id {
            self.check_category(user, category)?;
        }

        let now = Utc::now();
        let todo = self.todos.get_mut(&id).ok_or(AppError::NotFound("Todo"))?;
        if let Some(title) = input.title {
            todo.title = title;
        }
        if let Some(description) = input.description {
            todo.description = description;
        }
        if let Some(status) = input.status {
            if status != todo.status {
                todo.completed_at = (status == TodoStatus::Completed).then_some(now);
            }
            todo.status = status;
        }
        if let Some(priority) = input.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = input.due_date {
            todo.due_date = due_date;
        }
        if let Some(parent) = input.parent_todo_id {
            todo.parent_todo_id = parent;
        }
        if let Some(category) = input.category_id {
            todo.category_id = category;
        }
        if let Some(metadata) = input.metadata {
            todo.metadata = metadata;
        }
        todo.updated_at = now;
        Ok(todo.clone())
    }

    /// Removes the todo with its comments and attachments; children are
    /// detached rather than deleted.
    pub fn delete_todo(&mut self, user: &str, id: Uuid) -> Result<(), AppError> {
        self.owned_todo(user, id)?;
        self.todos.remove(&id);
        self.comments.retain(|_, c| c.todo_id != id);
        self.attachments.retain(|_, a| a.todo_id != id);
        for child in self.todos.values_mut() {
            if child.parent_todo_id == Some(id) {
                child.parent_todo_id = None;
            }
        }
        Ok(())
    }

    pub fn todo_stats(&self, user: &str) -> TodoStats {
        let now = Utc::now();
        let mut stats = TodoStats::default();
        for todo in self.todos.values().filter(|t| t.user_id == user) {
            stats.total += 1;
            match todo.status {
                TodoStatus::Draft => stats.draft += 1,
                TodoStatus::Active => stats.active += 1,
                TodoStatus::Completed => stats.completed += 1,
                TodoStatus::Archived => stats.archived += 1,
            }
            if todo.is_overdue(now) {
                stats.overdue += 1;
            }
        }
        stats
    }

    // -----------------------------------------------------------------------
    // Attachments
    // -----------------------------------------------------------------------

    pub fn add_attachment(
        &mut self,
        user: &str,
        todo_id: Uuid,
        name: String,
        mime_type: Option<String>,
        size: usize,
    ) -> Result<Attachment, AppError> {
        self.owned_todo(user, todo_id)?;
        if size > MAX_UPLOAD_BYTES {
            return Err(AppError::BadRequest(format!("File {name} is too large (max 10MB)")));
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        let attachment = Attachment {
            id,
            todo_id,
            download_key: format!("todos/{todo_id}/attachments/{id}/{name}"),
            name,
            uploaded_by: user.to_string(),
            file_size: Some(size as u64),
            mime_type,
            created_at: now,
            updated_at: now,
        };
        self.attachments.insert(id, attachment.clone());
        Ok(attachment)
    }

    fn owned_attachment(&self, user: &str, todo_id: Uuid, id: Uuid) -> Result<&Attachment, AppError> {
        self.owned_todo(user, todo_id)?;
        self.attachments
            .get(&id)
            .filter(|a| a.todo_id == todo_id)
            .ok_or(AppError::NotFound("Attachment"))
    }

    pub fn delete_attachment(&mut self, user: &str, todo_id: Uuid, id: Uuid) -> Result<(), AppError> {
        self.owned_attachment(user, todo_id, id)?;
        self.attachments.remove(&id);
        Ok(())
    }

    pub fn attachment_key(&self, user: &str, todo_id: Uuid, id: Uuid) -> Result<String, AppError> {
        Ok(self.owned_attachment(user, todo_id, id)?.download_key.clone())
    }

    // -----------------------------------------------------------------------
    // Categories
    // -----------------------------------------------------------------------

    fn owned_category(&self, user: &str, id: Uuid) -> Result<&Category, AppError> {
        self.categories
            .get(&id)
            .filter(|c| c.user_id == user)
            .ok_or(AppError::NotFound("Category"))
    }

    fn check_category_fields(
        name: Option<&str>,
        color: Option<&str>,
        description: Option<&str>,
    ) -> Result<(), AppError> {
        if let Some(name) = name {
            check_len("name", name, MAX_CATEGORY_NAME_CHARS)?;
        }
        if color.is_some_and(|c| c.trim().is_empty()) {
            return Err(AppError::BadRequest("color is required".to_string()));
        }
        if description.is_some_and(|d| d.chars().count() > MAX_CATEGORY_DESCRIPTION_CHARS) {
            return Err(AppError::BadRequest(format!(
                "description must be at most {MAX_CATEGORY_DESCRIPTION_CHARS} characters"
            )));
        }
        Ok(())
    }

    pub fn create_category(&mut self, user: &str, input: CreateCategory) -> Result<Category, AppError> {
        Self::check_category_fields(
            Some(&input.name),
            Some(&input.color),
            input.description.as_deref(),
        )?;
        let now = Utc::now();
        let category = Category {
            id: Uuid::new_v4(),
            user_id: user.to_string(),
            name: input.name,
            color: input.color,
            description: input.description,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    pub fn get_category(&self, user: &str, id: Uuid) -> Result<Category, AppError> {
        self.owned_category(user, id).cloned()
    }

    pub fn list_categories(&self, user: &str, query: &CategoryQuery) -> Result<Paginated<Category>, AppError> {
        let (page, limit) = page_bounds(query.page, query.limit, DEFAULT_CATEGORY_LIMIT)?;
        let mut categories: Vec<Category> = self
            .categories
            .values()
            .filter(|c| c.user_id == user)
            .filter(|c| query.search.as_deref().is_none_or(|q| contains_ci(&c.name, q)))
            .cloned()
            .collect();

        let sort = query.sort.unwrap_or_default();
        let order = query.order.unwrap_or_default();
        categories.sort_by(|a, b| {
            let ordering = match sort {
                CategorySort::CreatedAt => a.created_at.cmp(&b.created_at),
                CategorySort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                CategorySort::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            };
            directed(ordering, order)
        });
        Ok(paginate(categories, page, limit))
    }

    pub fn update_category(&mut self, user: &str, id: Uuid, input: UpdateCategory) -> Result<Category, AppError> {
        self.owned_category(user, id)?;
        Self::check_category_fields(
            input.name.as_deref(),
            input.color.as_deref(),
            input.description.as_ref().and_then(|d| d.as_deref()),
        )?;
        let category = self
            .categories
            .get_mut(&id)
            .ok_or(AppError::NotFound("Category"))?;
        if let Some(name) = input.name {
            category.name = name;
        }
        if let Some(color) = input.color {
            category.color = color;
        }
        if let Some(description) = input.description {
            category.description = description;
        }
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    /// Todos filed under the category are kept and lose their `categoryId`.
    pub fn delete_category(&mut self, user: &str, id: Uuid) -> Result<(), AppError> {
        self.owned_category(user, id)?;
        self.categories.remove(&id);
        for todo in self.todos.values_mut() {
            if todo.category_id == Some(id) {
                todo.category_id = None;
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Comments
    // -----------------------------------------------------------------------

    pub fn add_comment(&mut self, user: &str, todo_id: Uuid, content: String) -> Result<Comment, AppError> {
        self.owned_todo(user, todo_id)?;
        check_len("content", &content, MAX_COMMENT_CHARS)?;
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            todo_id,
            user_id: user.to_string(),
            content,
            created_at: now,
            updated_at: now,
        };
        self.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    pub fn list_comments(&self, user: &str, todo_id: Uuid) -> Result<Vec<Comment>, AppError> {
        self.owned_todo(user, todo_id)?;
        let mut comments: Vec<Comment> = self
            .comments
            .values()
            .filter(|c| c.todo_id == todo_id)
            .cloned()
            .collect();
        comments.sort_by_key(|c| c.created_at);
        Ok(comments)
    }

    fn owned_comment(&self, user: &str, id: Uuid) -> Result<&Comment, AppError> {
        self.comments
            .get(&id)
            .filter(|c| c.user_id == user)
            .ok_or(AppError::NotFound("Comment"))
    }

    pub fn update_comment(&mut self, user: &str, id: Uuid, content: String) -> Result<Comment, AppError> {
        self.owned_comment(user, id)?;
        check_len("content", &content, MAX_COMMENT_CHARS)?;
        let comment = self.comments.get_mut(&id).ok_or(AppError::NotFound("Comment"))?;
        comment.content = content;
        comment.updated_at = Utc::now();
        Ok(comment.clone())
    }

    pub fn delete_comment(&mut self, user: &str, id: Uuid) -> Result<(), AppError> {
        self.owned_comment(user, id)?;
        self.comments.remove(&id);
        Ok(())
    }
}

fn in_due_window(due: Option<DateTime<Utc>>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    if from.is_none() && to.is_none() {
        return true;
    }
    let Some(due) = due else {
        return false;
    };
    from.is_none_or(|f| due >= f) && to.is_none_or(|t| due <= t)
}

/// Field comparison; ties fall back to `sortOrder` so pages are stable.
fn compare_todos(a: &Todo, b: &Todo, sort: TodoSort) -> Ordering {
    let primary = match sort {
        TodoSort::CreatedAt => a.created_at.cmp(&b.created_at),
        TodoSort::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        TodoSort::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        TodoSort::Priority => a.priority.cmp(&b.priority),
        TodoSort::DueDate => a.due_date.cmp(&b.due_date),
        TodoSort::Status => (a.status as u8).cmp(&(b.status as u8)),
    };
    primary.then_with(|| a.sort_order.cmp(&b.sort_order))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(store: &mut Store, user: &str, title: &str) -> Todo {
        store
            .create_todo(
                user,
                CreateTodo {
                    title: title.to_string(),
                    description: None,
                    priority: None,
                    due_date: None,
                    parent_todo_id: None,
                    category_id: None,
                    metadata: None,
                },
            )
            .unwrap()
    }

    #[test]
    fn new_todo_defaults() {
        let mut store = Store::new();
        let todo = create(&mut store, "u1", "Buy milk");
        assert_eq!(todo.status, TodoStatus::Draft);
        assert_eq!(todo.sort_order, 0);
        let populated = store.get_todo("u1", todo.id).unwrap();
        assert!(populated.children.is_empty());
        assert!(populated.comments.is_empty());
        assert!(populated.attachments.is_empty());
    }

    #[test]
    fn sort_order_is_unique_after_deletes() {
        let mut store = Store::new();
        let first = create(&mut store, "u1", "first");
        let second = create(&mut store, "u1", "second");
        assert_eq!(second.sort_order, 1);

        store.delete_todo("u1", first.id).unwrap();
        let third = create(&mut store, "u1", "third");
        assert_eq!(third.sort_order, 2);
        assert_eq!(create(&mut store, "u2", "other user").sort_order, 0);
    }

    #[test]
    fn other_users_rows_are_not_found() {
        let mut store = Store::new();
        let todo = create(&mut store, "u1", "Mine");
        assert_eq!(store.get_todo("u2", todo.id).unwrap_err(), AppError::NotFound("Todo"));
        assert_eq!(store.delete_todo("u2", todo.id).unwrap_err(), AppError::NotFound("Todo"));
    }

    #[test]
    fn parent_must_belong_to_same_user() {
        let mut store = Store::new();
        let parent = create(&mut store, "u1", "Parent");
        let err = store
            .create_todo(
                "u2",
                CreateTodo {
                    title: "Child".to_string(),
                    description: None,
                    priority: None,
                    due_date: None,
                    parent_todo_id: Some(parent.id),
                    category_id: None,
                    metadata: None,
                },
            )
            .unwrap_err();
        assert_eq!(err, AppError::BadRequest("Parent todo not found".to_string()));
    }

    #[test]
    fn pagination_reports_total_pages() {
        let mut store = Store::new();
        for n in 0..21 {
            create(&mut store, "u1", &format!("todo {n}"));
        }
        let query = TodoQuery {
            page: Some(3),
            limit: Some(10),
            ..Default::default()
        };
        let page = store.list_todos("u1", &query).unwrap();
        assert_eq!(page.total, 21);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn completing_sets_completed_at() {
        let mut store = Store::new();
        let todo = create(&mut store, "u1", "Ship");
        let done = store
            .update_todo(
                "u1",
                todo.id,
                UpdateTodo {
                    status: Some(TodoStatus::Completed),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(done.completed_at.is_some());

        let reopened = store
            .update_todo(
                "u1",
                todo.id,
                UpdateTodo {
                    status: Some(TodoStatus::Active),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn deleting_category_detaches_todos() {
        let mut store = Store::new();
        let category = store
            .create_category(
                "u1",
                CreateCategory {
                    name: "Work".to_string(),
                    color: "#ff0000".to_string(),
                    description: None,
                },
            )
            .unwrap();
        let todo = create(&mut store, "u1", "Report");
        store
            .update_todo(
                "u1",
                todo.id,
                UpdateTodo {
                    category_id: Some(Some(category.id)),
                    ..Default::default()
                },
            )
            .unwrap();

        store.delete_category("u1", category.id).unwrap();
        assert_eq!(store.get_todo("u1", todo.id).unwrap().todo.category_id, None);
    }

    #[test]
    fn stats_count_overdue() {
        let mut store = Store::new();
        let todo = create(&mut store, "u1", "Late");
        store
            .update_todo(
                "u1",
                todo.id,
                UpdateTodo {
                    status: Some(TodoStatus::Active),
                    due_date: Some(Some(Utc::now() - chrono::Duration::days(2))),
                    ..Default::default()
                },
            )
            .unwrap();
        create(&mut store, "u1", "Fresh");
        let stats = store.todo_stats("u1");
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.draft, 1);
        assert_eq!(stats.overdue, 1);
    }

    #[test]
    fn oversized_attachment_rejected() {
        let mut store = Store::new();
        let todo = create(&mut store, "u1", "Files");
        let err = store
            .add_attachment("u1", todo.id, "big.bin".to_string(), None, MAX_UPLOAD_BYTES + 1)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
