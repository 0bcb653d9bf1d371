use chrono::Utc;
use uuid::Uuid;

use crate::{Comment, CommentId, CommentPath, ScopeId, Time, UserId};

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EventId(pub Uuid);

/// Something that happened to a comment, for whoever relays changes outside
/// of the board (outbox, feeds)
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Event {
    pub id: EventId,
    pub date: Time,
    pub comment_id: CommentId,
    pub scope: ScopeId,

    pub data: EventData,
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum EventData {
    Created {
        author_id: UserId,
        path: CommentPath,
        content: String,
    },
    ContentUpdated {
        content: String,
    },
    /// Deleted, but kept in place because it still has replies
    Tombstoned,
    /// Gone from storage. `cascaded` is set for tombstones that were removed
    /// because their last reply went away.
    Removed {
        cascaded: bool,
    },
}

impl Event {
    pub fn now(comment: &Comment, data: EventData) -> Event {
        Event {
            id: EventId(Uuid::new_v4()),
            date: Utc::now(),
            comment_id: comment.id(),
            scope: comment.scope(),
            data,
        }
    }

    pub fn created(comment: &Comment) -> Event {
        Event::now(
            comment,
            EventData::Created {
                author_id: comment.author_id(),
                path: comment.path().clone(),
                content: String::from(comment.content()),
            },
        )
    }
}
