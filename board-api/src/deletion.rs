//! Deleting comments
//!
//! A comment with replies is only tombstoned so that the replies keep their
//! place in the thread. A comment without replies is removed, and removing it
//! may leave its parent as a tombstone with no replies left: that parent is
//! then removed too, and so on up the tree.
//!
//! All the calls of one deletion go through the same [`Db`], which must run
//! them as one unit of work.

use anyhow::Context;

use crate::{Comment, CommentId, Db, Event, EventData};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Deletion {
    /// Already deleted, nothing to do
    Noop,
    /// Has replies: mark deleted, keep in storage
    Tombstone,
    /// No replies: remove from storage, then look at the ancestors
    Remove,
}

impl Deletion {
    pub fn plan(comment: &Comment, has_children: bool) -> Deletion {
        match (comment.is_deleted(), has_children) {
            (true, _) => Deletion::Noop,
            (false, true) => Deletion::Tombstone,
            (false, false) => Deletion::Remove,
        }
    }
}

/// Delete `comment`, returning what happened
///
/// The comment is read again from `db` first, so deleting a stale copy of a
/// comment that was already tombstoned or removed is a no-op.
pub async fn delete<D: Db>(db: &mut D, comment: &Comment) -> anyhow::Result<Vec<Event>> {
    delete_by_id(db, comment.id()).await
}

pub async fn delete_by_id<D: Db>(db: &mut D, id: CommentId) -> anyhow::Result<Vec<Event>> {
    let comment = match db
        .find_by_id(id)
        .await
        .with_context(|| format!("fetching comment {id:?} to delete"))?
    {
        Some(comment) => comment,
        None => {
            tracing::debug!(?id, "comment to delete is already gone");
            return Ok(Vec::new());
        }
    };
    let has_children = db
        .has_children(comment.scope(), comment.path())
        .await
        .with_context(|| format!("checking for replies to {id:?}"))?;
    match Deletion::plan(&comment, has_children) {
        Deletion::Noop => Ok(Vec::new()),
        Deletion::Tombstone => {
            let tombstone = comment.tombstoned();
            db.save(&tombstone)
                .await
                .with_context(|| format!("tombstoning comment {id:?}"))?;
            tracing::info!(?id, path=%tombstone.path(), "tombstoned comment with replies");
            Ok(vec![Event::now(&tombstone, EventData::Tombstoned)])
        }
        Deletion::Remove => remove_with_empty_ancestors(db, comment).await,
    }
}

async fn remove_with_empty_ancestors<D: Db>(
    db: &mut D,
    comment: Comment,
) -> anyhow::Result<Vec<Event>> {
    let scope = comment.scope();
    let mut events = Vec::new();
    let mut removed = comment;
    let mut cascaded = false;
    loop {
        db.delete_by_id(removed.id())
            .await
            .with_context(|| format!("removing comment {:?}", removed.id()))?;
        tracing::info!(id=?removed.id(), path=%removed.path(), cascaded, "removed comment");
        events.push(Event::now(&removed, EventData::Removed { cascaded }));

        let parent_path = match removed.path().parent() {
            Some(p) => p,
            None => break,
        };
        let parent = match db
            .find_by_path(scope, &parent_path)
            .await
            .with_context(|| format!("fetching parent comment at {parent_path}"))?
        {
            Some(p) => p,
            None => break,
        };
        if !parent.is_deleted() {
            break;
        }
        let has_children = db
            .has_children(scope, &parent_path)
            .await
            .with_context(|| format!("checking for replies left under {parent_path}"))?;
        if has_children {
            break;
        }
        removed = parent;
        cascaded = true;
    }
    Ok(events)
}
