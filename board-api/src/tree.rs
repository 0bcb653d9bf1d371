//! Creating and editing comments
//!
//! The pure functions take the last sibling path as read by the caller; the
//! async ones read it from a [`Db`] and persist the result. Allocation is
//! "read the last sibling, take the next slot", so two writers racing under
//! the same parent would pick the same path: see [`Db`] for who prevents it.

use anyhow::Context;
use chrono::Utc;

use crate::{
    Comment, CommentId, CommentPath, Db, Error, Event, EventData, IdGenerator, NewComment,
    OpError, TreePolicy,
};

pub fn create_root<G: IdGenerator>(
    ids: &mut G,
    new: NewComment,
    last_root: Option<&CommentPath>,
) -> Result<(Comment, Event), Error> {
    new.validate()?;
    let path = CommentPath::next_root(last_root)?;
    tracing::debug!(scope=?new.scope, %path, "allocated root path");
    let comment = Comment::fresh(ids.next_id(), new, path, Utc::now());
    let event = Event::created(&comment);
    Ok((comment, event))
}

pub fn create_child<G: IdGenerator>(
    ids: &mut G,
    new: NewComment,
    parent: &Comment,
    last_descendant: Option<&CommentPath>,
    policy: &TreePolicy,
) -> Result<(Comment, Event), Error> {
    new.validate()?;
    if parent.scope() != new.scope {
        return Err(Error::ParentNotFound(parent.id()));
    }
    policy.check_reply(parent)?;
    if parent.is_deleted() {
        return Err(Error::DeletedParentReply(parent.id()));
    }
    let path = parent.path().create_child_path(last_descendant)?;
    tracing::debug!(scope=?new.scope, parent=?parent.id(), %path, "allocated reply path");
    let comment = Comment::fresh(ids.next_id(), new, path, Utc::now());
    let event = Event::created(&comment);
    Ok((comment, event))
}

pub fn update_content(comment: &Comment, content: String) -> Result<(Comment, Event), Error> {
    crate::validate_string(&content)?;
    if comment.is_deleted() {
        return Err(Error::CommentDeleted(comment.id()));
    }
    let updated = comment.with_content(content.clone());
    let event = Event::now(&updated, EventData::ContentUpdated { content });
    Ok((updated, event))
}

/// Post a new comment, as a root of its scope or as a reply to `parent`
pub async fn create_comment<D: Db, G: IdGenerator>(
    db: &mut D,
    ids: &mut G,
    policy: &TreePolicy,
    new: NewComment,
    parent: Option<CommentId>,
) -> Result<(Comment, Event), OpError> {
    let parent_id = match parent {
        None => {
            let last_root = db
                .last_sibling_path(new.scope, None)
                .await
                .with_context(|| format!("fetching last root path of {:?}", new.scope))?;
            let (comment, event) = create_root(ids, new, last_root.as_ref())?;
            db.save(&comment)
                .await
                .with_context(|| format!("saving root comment {:?}", comment.id()))?;
            return Ok((comment, event));
        }
        Some(parent_id) => parent_id,
    };
    let parent = db
        .find_by_id(parent_id)
        .await
        .with_context(|| format!("fetching parent comment {parent_id:?}"))?
        .ok_or(OpError::parent_not_found(parent_id))?;
    let last_descendant = db
        .last_sibling_path(parent.scope(), Some(parent.path()))
        .await
        .with_context(|| format!("fetching last reply path under {parent_id:?}"))?;
    let (comment, event) = create_child(ids, new, &parent, last_descendant.as_ref(), policy)?;
    db.save(&comment)
        .await
        .with_context(|| format!("saving reply comment {:?}", comment.id()))?;
    Ok((comment, event))
}

pub async fn update_comment<D: Db>(
    db: &mut D,
    id: CommentId,
    content: String,
) -> Result<(Comment, Event), OpError> {
    let comment = db
        .find_by_id(id)
        .await
        .with_context(|| format!("fetching comment {id:?}"))?
        .ok_or(OpError::comment_not_found(id))?;
    let (updated, event) = update_content(&comment, content)?;
    db.save(&updated)
        .await
        .with_context(|| format!("saving edited comment {id:?}"))?;
    Ok((updated, event))
}
