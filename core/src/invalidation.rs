//! Which cached reads each successful write makes stale.
//!
//! The graph is maintained by hand: every `Mutation` lists the key filters it
//! invalidates. Delete-comment is the odd one out because its input carries
//! only the comment id; the parent todo is recovered from cached comment
//! lists before the request is sent (see `recover_comment_parent`).

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::cache::{KeyFilter, QueryCache, QueryScope};

/// A write that succeeded, with the ids its invalidations depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    CreateTodo,
    UpdateTodo { id: Uuid },
    DeleteTodo { id: Uuid },
    UploadAttachment { todo_id: Uuid },
    DeleteAttachment { todo_id: Uuid },
    CreateCategory,
    UpdateCategory { id: Uuid },
    DeleteCategory { id: Uuid },
    AddComment { todo_id: Uuid },
    /// `todo_id` is taken from the updated comment in the response.
    UpdateComment { todo_id: Uuid },
    /// `todo_id` is `None` when no cached comment list held the comment.
    DeleteComment { todo_id: Option<Uuid> },
}

impl Mutation {
    pub fn invalidates(&self) -> Vec<KeyFilter> {
        use QueryScope::*;

        let all_todos = KeyFilter::scope(AllTodos);
        match *self {
            Mutation::CreateTodo => vec![all_todos, KeyFilter::scope(TodoStats)],
            Mutation::UpdateTodo { id } | Mutation::DeleteTodo { id } => vec![
                all_todos,
                KeyFilter::exact(TodoById, id.to_string()),
                KeyFilter::scope(TodoStats),
            ],
            Mutation::UploadAttachment { todo_id } | Mutation::DeleteAttachment { todo_id } => vec![
                KeyFilter::exact(TodoById, todo_id.to_string()),
                KeyFilter::exact(TodoAttachments, todo_id.to_string()),
                all_todos,
            ],
            Mutation::CreateCategory => vec![KeyFilter::scope(AllCategories)],
            Mutation::UpdateCategory { id } => vec![
                KeyFilter::scope(AllCategories),
                KeyFilter::exact(CategoryById, id.to_string()),
            ],
            Mutation::DeleteCategory { id } => vec![
                KeyFilter::scope(AllCategories),
                KeyFilter::exact(CategoryById, id.to_string()),
                all_todos,
            ],
            Mutation::AddComment { todo_id } | Mutation::UpdateComment { todo_id } => vec![
                KeyFilter::exact(CommentsByTodoId, todo_id.to_string()),
                KeyFilter::exact(TodoById, todo_id.to_string()),
                all_todos,
            ],
            Mutation::DeleteComment { todo_id: Some(todo_id) } => vec![
                KeyFilter::exact(CommentsByTodoId, todo_id.to_string()),
                KeyFilter::exact(TodoById, todo_id.to_string()),
                all_todos,
            ],
            Mutation::DeleteComment { todo_id: None } => vec![all_todos],
        }
    }

    /// Apply every invalidation to `cache`. Returns the number of entries marked.
    pub fn apply(&self, cache: &QueryCache) -> usize {
        self.invalidates()
            .iter()
            .map(|filter| cache.invalidate(filter))
            .sum()
    }
}

/// Find the todo owning `comment_id` by scanning cached comment lists.
///
/// Best-effort: returns `None` if the list was never fetched or has been
/// evicted.
pub fn recover_comment_parent(cache: &QueryCache, comment_id: Uuid) -> Option<Uuid> {
    let wanted = comment_id.to_string();
    let found = cache
        .find_all(QueryScope::CommentsByTodoId)
        .into_iter()
        .find_map(|(_, data)| match data {
            Value::Array(comments) => comments.iter().find_map(|comment| {
                (comment.get("id").and_then(Value::as_str) == Some(wanted.as_str()))
                    .then(|| comment.get("todoId").and_then(Value::as_str))
                    .flatten()
                    .and_then(|id| Uuid::parse_str(id).ok())
            }),
            _ => None,
        });

    if found.is_none() {
        debug!(%comment_id, "comment parent not in cache");
    }
    found
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::cache::QueryKey;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn scopes(mutation: Mutation) -> Vec<(QueryScope, Option<String>)> {
        mutation
            .invalidates()
            .into_iter()
            .map(|f| (f.scope, f.param))
            .collect()
    }

    #[test]
    fn create_todo() {
        assert_eq!(
            scopes(Mutation::CreateTodo),
            vec![(QueryScope::AllTodos, None), (QueryScope::TodoStats, None)]
        );
    }

    #[test]
    fn update_and_delete_todo() {
        for mutation in [Mutation::UpdateTodo { id: id(1) }, Mutation::DeleteTodo { id: id(1) }] {
            assert_eq!(
                scopes(mutation),
                vec![
                    (QueryScope::AllTodos, None),
                    (QueryScope::TodoById, Some(id(1).to_string())),
                    (QueryScope::TodoStats, None),
                ]
            );
        }
    }

    #[test]
    fn attachments() {
        for mutation in [
            Mutation::UploadAttachment { todo_id: id(2) },
            Mutation::DeleteAttachment { todo_id: id(2) },
        ] {
            assert_eq!(
                scopes(mutation),
                vec![
                    (QueryScope::TodoById, Some(id(2).to_string())),
                    (QueryScope::TodoAttachments, Some(id(2).to_string())),
                    (QueryScope::AllTodos, None),
                ]
            );
        }
    }

    #[test]
    fn categories() {
        assert_eq!(
            scopes(Mutation::CreateCategory),
            vec![(QueryScope::AllCategories, None)]
        );
        assert_eq!(
            scopes(Mutation::UpdateCategory { id: id(3) }),
            vec![
                (QueryScope::AllCategories, None),
                (QueryScope::CategoryById, Some(id(3).to_string())),
            ]
        );
        assert_eq!(
            scopes(Mutation::DeleteCategory { id: id(3) }),
            vec![
                (QueryScope::AllCategories, None),
                (QueryScope::CategoryById, Some(id(3).to_string())),
                (QueryScope::AllTodos, None),
            ]
        );
    }

    #[test]
    fn comments() {
        let expected = vec![
            (QueryScope::CommentsByTodoId, Some(id(4).to_string())),
            (QueryScope::TodoById, Some(id(4).to_string())),
            (QueryScope::AllTodos, None),
        ];
        assert_eq!(scopes(Mutation::AddComment { todo_id: id(4) }), expected);
        assert_eq!(scopes(Mutation::UpdateComment { todo_id: id(4) }), expected);
        assert_eq!(
            scopes(Mutation::DeleteComment { todo_id: Some(id(4)) }),
            expected
        );
        assert_eq!(
            scopes(Mutation::DeleteComment { todo_id: None }),
            vec![(QueryScope::AllTodos, None)]
        );
    }

    #[test]
    fn recovers_parent_from_cached_list() {
        let cache = QueryCache::default();
        cache.set(
            QueryKey::with_param(QueryScope::CommentsByTodoId, id(10).to_string()),
            json!([{ "id": id(11).to_string(), "todoId": id(10).to_string() }]),
        );
        cache.set(
            QueryKey::with_param(QueryScope::CommentsByTodoId, id(20).to_string()),
            json!([{ "id": id(21).to_string(), "todoId": id(20).to_string() }]),
        );
        assert_eq!(recover_comment_parent(&cache, id(21)), Some(id(20)));
        assert_eq!(recover_comment_parent(&cache, id(11)), Some(id(10)));
    }

    #[test]
    fn unknown_comment_recovers_nothing() {
        let cache = QueryCache::default();
        assert_eq!(recover_comment_parent(&cache, id(99)), None);

        cache.set(
            QueryKey::with_param(QueryScope::CommentsByTodoId, id(10).to_string()),
            json!([]),
        );
        assert_eq!(recover_comment_parent(&cache, id(99)), None);
    }

    #[test]
    fn apply_marks_cached_entries() {
        let cache = QueryCache::default();
        cache.set(QueryKey::with_param(QueryScope::AllTodos, "page=1"), json!({}));
        cache.set(QueryKey::with_param(QueryScope::AllTodos, "page=2"), json!({}));
        cache.set(QueryKey::new(QueryScope::TodoStats), json!({}));
        cache.set(QueryKey::new(QueryScope::AllCategories), json!({}));

        assert_eq!(Mutation::CreateTodo.apply(&cache), 3);
        assert!(!cache.is_stale(&QueryKey::new(QueryScope::AllCategories)));
    }
}
