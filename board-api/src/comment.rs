use uuid::Uuid;

use crate::{CommentPath, Error, ScopeId, Time, UserId, STUB_UUID};

#[derive(
    Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize,
)]
pub struct CommentId(pub Uuid);

impl CommentId {
    pub fn stub() -> CommentId {
        CommentId(STUB_UUID)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct NewComment {
    pub scope: ScopeId,
    pub author_id: UserId,
    pub content: String,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), Error> {
        crate::validate_string(&self.content)
    }
}

/// A node of a comment tree
///
/// The id and path are set at creation and never change: comments do not move
/// in the tree. `deleted` only ever goes from `false` to `true`.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    id: CommentId,
    scope: ScopeId,
    author_id: UserId,
    content: String,
    path: CommentPath,
    deleted: bool,
    created_at: Time,
}

impl Comment {
    pub(crate) fn fresh(id: CommentId, new: NewComment, path: CommentPath, now: Time) -> Comment {
        Comment {
            id,
            scope: new.scope,
            author_id: new.author_id,
            content: new.content,
            path,
            deleted: false,
            created_at: now,
        }
    }

    /// Rebuild a comment as it was stored. Only meant for `Db` implementations.
    pub fn restore(
        id: CommentId,
        scope: ScopeId,
        author_id: UserId,
        content: String,
        path: CommentPath,
        deleted: bool,
        created_at: Time,
    ) -> Comment {
        Comment {
            id,
            scope,
            author_id,
            content,
            path,
            deleted,
            created_at,
        }
    }

    pub fn id(&self) -> CommentId {
        self.id
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn author_id(&self) -> UserId {
        self.author_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The content readers should see: tombstones keep their place in the
    /// thread but not their text
    pub fn visible_content(&self) -> Option<&str> {
        match self.deleted {
            true => None,
            false => Some(&self.content),
        }
    }

    pub fn path(&self) -> &CommentPath {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn created_at(&self) -> Time {
        self.created_at
    }

    pub fn with_content(&self, content: String) -> Comment {
        Comment {
            content,
            ..self.clone()
        }
    }

    pub(crate) fn tombstoned(&self) -> Comment {
        Comment {
            deleted: true,
            ..self.clone()
        }
    }
}
