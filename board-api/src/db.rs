use async_trait::async_trait;
use uuid::Uuid;

use crate::{Comment, CommentId, CommentPath, ScopeId};

/// Storage for comment trees
///
/// Every method on one `Db` value is expected to run in the same unit of work:
/// a delete cascade issues several calls and must commit or fail as a whole.
/// Sibling allocation reads the last sibling then saves the next one, so
/// writers under the same parent must be serialized by the implementation
/// (lock, single writer, or unique `(scope, path)` plus retry).
#[async_trait]
pub trait Db {
    /// Insert or overwrite the comment with this id
    async fn save(&mut self, comment: &Comment) -> anyhow::Result<()>;

    async fn find_by_id(&mut self, id: CommentId) -> anyhow::Result<Option<Comment>>;

    async fn find_by_path(
        &mut self,
        scope: ScopeId,
        path: &CommentPath,
    ) -> anyhow::Result<Option<Comment>>;

    /// With no parent, the greatest root path of the scope. With a parent,
    /// the greatest path strictly below it, at any depth: callers only look
    /// at the chunk right below the parent.
    async fn last_sibling_path(
        &mut self,
        scope: ScopeId,
        parent: Option<&CommentPath>,
    ) -> anyhow::Result<Option<CommentPath>>;

    /// Whether any comment sits exactly one level below `path`
    async fn has_children(&mut self, scope: ScopeId, path: &CommentPath) -> anyhow::Result<bool>;

    /// Does nothing if there is no such comment
    async fn delete_by_id(&mut self, id: CommentId) -> anyhow::Result<()>;

    /// Comments of the scope in path order, starting right after `after`
    async fn list_comments(
        &mut self,
        scope: ScopeId,
        after: Option<&CommentPath>,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>>;

    async fn count_comments(&mut self, scope: ScopeId) -> anyhow::Result<usize>;
}

pub trait IdGenerator {
    fn next_id(&mut self) -> CommentId;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> CommentId {
        CommentId(Uuid::new_v4())
    }
}
