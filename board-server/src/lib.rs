use anyhow::Context;
use board_api::{
    deletion, tree, Comment, CommentId, CommentPath, Db, Event, IdGenerator, NewComment, OpError,
    RandomIds, ScopeId, TreePolicy,
};
use sqlx::postgres::{PgPool, PgPoolOptions};

mod db;
pub use db::PgDb;

#[cfg(test)]
mod fuzz;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

pub async fn create_sqlx_pool(db_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(8)
        .connect(db_url)
        .await
        .with_context(|| format!("Error opening database {:?}", db_url))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub policy: TreePolicy,
    /// How many times to try allocating a path when the previous try collided
    /// with a concurrent writer
    pub max_allocation_attempts: usize,
}

impl Default for ServiceConfig {
    fn default() -> ServiceConfig {
        ServiceConfig {
            policy: TreePolicy::default(),
            max_allocation_attempts: 3,
        }
    }
}

/// Whether `err` comes from postgres refusing a duplicate key
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|e| {
        e.downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .and_then(|e| e.code())
            .map_or(false, |code| code == "23505")
    })
}

/// Serializes the writers of one scope until the end of the transaction
///
/// A delete cascade decides based on the replies it sees, and a reply checks
/// that its parent still exists: both would be wrong if another writer of the
/// same scope committed in between.
async fn lock_scope(conn: &mut sqlx::PgConnection, scope: ScopeId) -> anyhow::Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::TEXT))")
        .bind(scope.0)
        .execute(conn)
        .await
        .with_context(|| format!("locking scope {scope:?}"))?;
    Ok(())
}

async fn lock_scope_of(conn: &mut sqlx::PgConnection, id: CommentId) -> anyhow::Result<()> {
    let comment = PgDb(&mut *conn).find_by_id(id).await?;
    if let Some(c) = comment {
        lock_scope(conn, c.scope()).await?;
    }
    Ok(())
}

/// Comment boards stored in postgres
///
/// Every operation runs in its own transaction, so a failure leaves nothing
/// half-done.
pub struct CommentService<G = RandomIds> {
    pool: PgPool,
    config: ServiceConfig,
    ids: G,
}

impl CommentService<RandomIds> {
    pub fn new(pool: PgPool, config: ServiceConfig) -> CommentService<RandomIds> {
        CommentService::with_ids(pool, config, RandomIds)
    }
}

impl<G: IdGenerator + Send> CommentService<G> {
    pub fn with_ids(pool: PgPool, config: ServiceConfig, ids: G) -> CommentService<G> {
        CommentService { pool, config, ids }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn create_comment(
        &mut self,
        new: NewComment,
        parent: Option<CommentId>,
    ) -> Result<(Comment, Event), OpError> {
        let mut attempt = 1;
        loop {
            let mut tx = self.pool.begin().await.context("opening transaction")?;
            lock_scope(&mut *tx, new.scope).await?;
            let res = tree::create_comment(
                &mut PgDb(&mut *tx),
                &mut self.ids,
                &self.config.policy,
                new.clone(),
                parent,
            )
            .await;
            match res {
                Ok(res) => {
                    tx.commit().await.context("committing new comment")?;
                    return Ok(res);
                }
                Err(OpError::Anyhow(err))
                    if is_unique_violation(&err) && attempt < self.config.max_allocation_attempts =>
                {
                    tracing::warn!(
                        attempt,
                        scope = ?new.scope,
                        ?parent,
                        "allocated path was taken concurrently, retrying"
                    );
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn update_comment(
        &mut self,
        id: CommentId,
        content: String,
    ) -> Result<(Comment, Event), OpError> {
        let mut tx = self.pool.begin().await.context("opening transaction")?;
        lock_scope_of(&mut *tx, id).await?;
        let res = tree::update_comment(&mut PgDb(&mut *tx), id, content).await?;
        tx.commit().await.context("committing edited comment")?;
        Ok(res)
    }

    pub async fn delete_comment(&mut self, id: CommentId) -> Result<Vec<Event>, OpError> {
        let mut tx = self.pool.begin().await.context("opening transaction")?;
        lock_scope_of(&mut *tx, id).await?;
        let events = deletion::delete_by_id(&mut PgDb(&mut *tx), id).await?;
        tx.commit().await.context("committing deletion")?;
        Ok(events)
    }

    pub async fn get_comment(&self, id: CommentId) -> anyhow::Result<Option<Comment>> {
        let mut conn = self.pool.acquire().await.context("acquiring connection")?;
        let comment = PgDb(&mut *conn).find_by_id(id).await?;
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        scope: ScopeId,
        after: Option<&CommentPath>,
        limit: usize,
    ) -> anyhow::Result<Vec<Comment>> {
        let mut conn = self.pool.acquire().await.context("acquiring connection")?;
        let comments = PgDb(&mut *conn).list_comments(scope, after, limit).await?;
        Ok(comments)
    }

    pub async fn count_comments(&self, scope: ScopeId) -> anyhow::Result<usize> {
        let mut conn = self.pool.acquire().await.context("acquiring connection")?;
        let count = PgDb(&mut *conn).count_comments(scope).await?;
        Ok(count)
    }
}
