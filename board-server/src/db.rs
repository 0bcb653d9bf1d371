use anyhow::Context;
use async_trait::async_trait;
use board_api::{Comment, CommentId, CommentPath, Db, ScopeId, Time, UserId, CHUNK_SIZE};
use futures::TryStreamExt;
use sqlx::{postgres::PgRow, Row};

/// Comment storage on one postgres connection
///
/// Hand it a transaction to make an operation a single unit of work.
pub struct PgDb<'a>(pub &'a mut sqlx::PgConnection);

fn comment_from_row(row: &PgRow) -> anyhow::Result<Comment> {
    let path: String = row.try_get("path").context("reading path column")?;
    Ok(Comment::restore(
        CommentId(row.try_get("id").context("reading id column")?),
        ScopeId(row.try_get("scope_id").context("reading scope_id column")?),
        UserId(row.try_get("author_id").context("reading author_id column")?),
        row.try_get("content").context("reading content column")?,
        CommentPath::new(path).context("parsing stored path")?,
        row.try_get("deleted").context("reading deleted column")?,
        row.try_get::<Time, _>("created_at")
            .context("reading created_at column")?,
    ))
}

/// LIKE pattern for the paths below `path`, `levels` chunks down exactly, or
/// at any depth if `levels` is `None`
fn below(path: &CommentPath, levels: Option<usize>) -> String {
    match levels {
        Some(l) => format!("{}{}", path, "_".repeat(l * CHUNK_SIZE)),
        None => format!("{}_%", path),
    }
}

#[async_trait]
impl<'a> Db for PgDb<'a> {
    async fn save(&mut self, comment: &Comment) -> anyhow::Result<()> {
        sqlx::query(
            "
                INSERT INTO comments
                    (id, scope_id, author_id, content, path, deleted, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE
                    SET content = EXCLUDED.content,
                        deleted = EXCLUDED.deleted
            ",
        )
        .bind(comment.id().0)
        .bind(comment.scope().0)
        .bind(comment.author_id().0)
        .bind(comment.content())
        .bind(comment.path().as_str())
        .bind(comment.is_deleted())
        .bind(comment.created_at())
        .execute(&mut *self.0)
        .await
        .with_context(|| format!("upserting comment {:?}", comment.id()))?;
        Ok(())
    }

    async fn find_by_id(&mut self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        sqlx::query(
            "
                SELECT id, scope_id, author_id, content, path, deleted, created_at
                    FROM comments
                WHERE id = $1
            ",
        )
        .bind(id.0)
        .fetch_optional(&mut *self.0)
        .await
        .with_context(|| format!("querying comment {id:?}"))?
        .map(|row| comment_from_row(&row))
        .transpose()
    }

    async fn find_by_path(
        &mut self,
        scope: ScopeId,
        path: &CommentPath,
    ) -> anyhow::Result<Option<Comment>> {
        sqlx::query(
            "
                SELECT id, scope_id, author_id, content, path, deleted, created_at
                    FROM comments
                WHERE scope_id = $1
                AND path = $2
            ",
        )
        .bind(scope.0)
        .bind(path.as_str())
        .fetch_optional(&mut *self.0)
        .await
        .with_context(|| format!("querying comment at {path} in {scope:?}"))?
        .map(|row| comment_from_row(&row))
        .transpose()
    }

    async fn last_sibling_path(
        &mut self,
        scope: ScopeId,
        parent: Option<&CommentPath>,
    ) -> anyhow::Result<Option<CommentPath>> {
        let pattern = match parent {
            None => "_".repeat(CHUNK_SIZE),
            Some(p) => below(p, None),
        };
        let path: Option<String> = sqlx::query(
            "
                SELECT path
                    FROM comments
                WHERE scope_id = $1
                AND path LIKE $2
                ORDER BY path DESC
                LIMIT 1
            ",
        )
        .bind(scope.0)
        .bind(pattern.as_str())
        .fetch_optional(&mut *self.0)
        .await
        .with_context(|| format!("querying last path matching {pattern:?} in {scope:?}"))?
        .map(|row| row.try_get::<String, _>("path"))
        .transpose()
        .context("reading path column")?;
        Ok(path
            .map(CommentPath::new)
            .transpose()
            .context("parsing stored path")?)
    }

    async fn has_children(&mut self, scope: ScopeId, path: &CommentPath) -> anyhow::Result<bool> {
        sqlx::query(
            "
                SELECT EXISTS (
                    SELECT 1 FROM comments WHERE scope_id = $1 AND path LIKE $2
                ) AS found
            ",
        )
        .bind(scope.0)
        .bind(below(path, Some(1)))
        .fetch_one(&mut *self.0)
        .await
        .with_context(|| format!("querying replies to {path} in {scope:?}"))?
        .try_get("found")
        .context("reading found column")
    }

    async fn delete_by_id(&mut self, id: CommentId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id.0)
            .execute(&mut *self.0)
            .await
            .with_context(|| format!("deleting comment {id:?}"))?;
        Ok(())
    }

    async fn list_comments(
        &mut self,
        scope: ScopeId,
        after: Option<&CommentPath>,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        sqlx::query(
            "
                SELECT id, scope_id, author_id, content, path, deleted, created_at
                    FROM comments
                WHERE scope_id = $1
                AND ($2::VARCHAR IS NULL OR path > $2)
                ORDER BY path
                LIMIT $3
            ",
        )
        .bind(scope.0)
        .bind(after.map(|p| p.as_str()))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch(&mut *self.0)
        .map_ok(|row| comment_from_row(&row))
        .try_collect::<Vec<_>>()
        .await
        .with_context(|| format!("listing comments of {scope:?} after {after:?}"))?
        .into_iter()
        .collect()
    }

    async fn count_comments(&mut self, scope: ScopeId) -> anyhow::Result<usize> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM comments WHERE scope_id = $1")
            .bind(scope.0)
            .fetch_one(&mut *self.0)
            .await
            .with_context(|| format!("counting comments of {scope:?}"))?
            .try_get("count")
            .context("reading count column")?;
        usize::try_from(count).context("comment count does not fit in usize")
    }
}
