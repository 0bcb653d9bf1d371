use crate::CommentId;

#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Invalid comment path {0:?}")]
    InvalidPathFormat(String),

    #[error("Comment path is {0} levels deep, more than allowed")]
    PathDepthExceeded(usize),

    #[error("No sibling slot left after {0:?}")]
    PathOverflow(String),

    #[error("Comment {parent:?} is too deep to be replied to (max reply depth {max_reply_depth})")]
    NotRootReply {
        parent: CommentId,
        max_reply_depth: usize,
    },

    #[error("Comment {0:?} was deleted and cannot be replied to")]
    DeletedParentReply(CommentId),

    #[error("Parent comment {0:?} not found")]
    ParentNotFound(CommentId),

    #[error("Comment {0:?} not found")]
    CommentNotFound(CommentId),

    #[error("Comment {0:?} was deleted and cannot be edited")]
    CommentDeleted(CommentId),

    #[error("Null byte in string is not allowed {0:?}")]
    NullByteInString(String),

    #[error("Invalid tree policy: {0}")]
    InvalidPolicy(String),
}

/// Failure of an operation that talks to a [`Db`](crate::Db)
///
/// Storage failures stay in `Anyhow`, domain rejections in `Api`, so that
/// callers can tell "the request was refused" from "something broke".
#[derive(Debug, thiserror::Error)]
pub enum OpError {
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error(transparent)]
    Api(#[from] Error),
}

impl OpError {
    pub fn parent_not_found(id: CommentId) -> OpError {
        OpError::Api(Error::ParentNotFound(id))
    }

    pub fn comment_not_found(id: CommentId) -> OpError {
        OpError::Api(Error::CommentNotFound(id))
    }

    /// The domain error, if this is one
    pub fn api(&self) -> Option<&Error> {
        match self {
            OpError::Anyhow(_) => None,
            OpError::Api(e) => Some(e),
        }
    }
}
