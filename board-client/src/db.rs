use std::{
    collections::{BTreeMap, HashMap},
    ops::Bound,
    sync::Arc,
};

use async_trait::async_trait;

use crate::{
    api::{Comment, CommentId, CommentPath, Db, ScopeId},
    Thread,
};

/// In-memory comment storage
///
/// Comments are kept ordered by `(scope, path)`, so a subtree is a contiguous
/// range just like in the postgres tables. Cloning is cheap until one of the
/// clones is modified, which makes it usable as a snapshot.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BoardDump {
    comments: Arc<BTreeMap<(ScopeId, CommentPath), Comment>>,
    paths: Arc<HashMap<CommentId, (ScopeId, CommentPath)>>,
}

impl BoardDump {
    pub fn new() -> BoardDump {
        BoardDump::default()
    }

    pub fn add_comments(&mut self, comments: Vec<Comment>) {
        let by_path = Arc::make_mut(&mut self.comments);
        let paths = Arc::make_mut(&mut self.paths);
        for c in comments {
            let key = (c.scope(), c.path().clone());
            if let Some(old_key) = paths.insert(c.id(), key.clone()) {
                if old_key != key {
                    by_path.remove(&old_key);
                }
            }
            let id = c.id();
            if let Some(old) = by_path.insert(key, c) {
                if old.id() != id {
                    paths.remove(&old.id());
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, id: &CommentId) -> Option<&Comment> {
        self.paths.get(id).and_then(|key| self.comments.get(key))
    }

    pub fn get_by_path(&self, scope: ScopeId, path: &CommentPath) -> Option<&Comment> {
        self.comments.get(&(scope, path.clone()))
    }

    /// All the comments of `scope`, in path order
    pub fn comments(&self, scope: ScopeId) -> impl Iterator<Item = &Comment> {
        self.comments
            .range((scope, CommentPath::first_root())..)
            .take_while(move |((s, _), _)| *s == scope)
            .map(|(_, c)| c)
    }

    /// Comments strictly below `path`, in path order
    pub fn subtree<'a>(
        &'a self,
        scope: ScopeId,
        path: &'a CommentPath,
    ) -> impl Iterator<Item = &'a Comment> {
        self.comments
            .range((Bound::Excluded((scope, path.clone())), Bound::Unbounded))
            .take_while(move |((s, p), _)| *s == scope && path.is_ancestor_of(p))
            .map(|(_, c)| c)
    }

    pub fn threads(&self, scope: ScopeId) -> Vec<Thread> {
        Thread::build(self.comments(scope).cloned())
    }

    fn remove(&mut self, id: &CommentId) -> Option<Comment> {
        let key = Arc::make_mut(&mut self.paths).remove(id)?;
        Arc::make_mut(&mut self.comments).remove(&key)
    }
}

#[async_trait]
impl Db for BoardDump {
    async fn save(&mut self, comment: &Comment) -> anyhow::Result<()> {
        if let Some(other) = self.get_by_path(comment.scope(), comment.path()) {
            anyhow::ensure!(
                other.id() == comment.id(),
                "path {} of {:?} already used by {:?} in {:?}",
                comment.path(),
                comment.id(),
                other.id(),
                comment.scope(),
            );
        }
        self.add_comments(vec![comment.clone()]);
        Ok(())
    }

    async fn find_by_id(&mut self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        Ok(self.get(&id).cloned())
    }

    async fn find_by_path(
        &mut self,
        scope: ScopeId,
        path: &CommentPath,
    ) -> anyhow::Result<Option<Comment>> {
        Ok(self.get_by_path(scope, path).cloned())
    }

    async fn last_sibling_path(
        &mut self,
        scope: ScopeId,
        parent: Option<&CommentPath>,
    ) -> anyhow::Result<Option<CommentPath>> {
        Ok(match parent {
            None => self
                .comments(scope)
                .filter(|c| c.is_root())
                .last()
                .map(|c| c.path().clone()),
            Some(parent) => self.subtree(scope, parent).last().map(|c| c.path().clone()),
        })
    }

    async fn has_children(&mut self, scope: ScopeId, path: &CommentPath) -> anyhow::Result<bool> {
        Ok(self
            .subtree(scope, path)
            .any(|c| c.depth() == path.depth() + 1))
    }

    async fn delete_by_id(&mut self, id: CommentId) -> anyhow::Result<()> {
        self.remove(&id);
        Ok(())
    }

    async fn list_comments(
        &mut self,
        scope: ScopeId,
        after: Option<&CommentPath>,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        let start = match after {
            None => Bound::Included((scope, CommentPath::first_root())),
            Some(after) => Bound::Excluded((scope, after.clone())),
        };
        Ok(self
            .comments
            .range((start, Bound::Unbounded))
            .take_while(|((s, _), _)| *s == scope)
            .take(limit)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn count_comments(&mut self, scope: ScopeId) -> anyhow::Result<usize> {
        Ok(self.comments(scope).count())
    }
}
