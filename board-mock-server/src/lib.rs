use std::sync::Arc;

use board_client::{
    api::{
        deletion, tree, Comment, CommentId, CommentPath, Db, Event, IdGenerator, NewComment,
        OpError, ScopeId, TreePolicy, Uuid,
    },
    BoardDump, Thread,
};
use tokio::sync::{mpsc, Mutex};

/// Ids counting up from 1, so that runs can be replayed
#[derive(Clone, Debug, Default)]
pub struct SequentialIds(u128);

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> CommentId {
        self.0 += 1;
        CommentId(Uuid::from_u128(self.0))
    }
}

/// In-memory comment board
///
/// Writes take `&mut self`, so they are serialized, and each of them works on
/// a snapshot of the store that only replaces the store once the whole
/// operation succeeded.
#[derive(Debug)]
pub struct MockServer {
    db: BoardDump,
    ids: SequentialIds,
    policy: TreePolicy,
    feeds: Vec<mpsc::UnboundedSender<Event>>,
}

pub type SharedMockServer = Arc<Mutex<MockServer>>;

impl MockServer {
    pub fn new() -> MockServer {
        MockServer::with_policy(TreePolicy::default())
    }

    pub fn with_policy(policy: TreePolicy) -> MockServer {
        MockServer {
            db: BoardDump::new(),
            ids: SequentialIds::default(),
            policy,
            feeds: Vec::new(),
        }
    }

    pub fn shared(self) -> SharedMockServer {
        Arc::new(Mutex::new(self))
    }

    pub fn db(&self) -> &BoardDump {
        &self.db
    }

    pub fn policy(&self) -> &TreePolicy {
        &self.policy
    }

    /// Return the current number of stored comments, tombstones included
    pub fn test_num_comments(&self) -> usize {
        self.db.len()
    }

    fn relay_events(&mut self, events: &[Event]) {
        self.feeds
            .retain(|f| events.iter().all(|e| f.send(e.clone()).is_ok()));
    }

    pub async fn create_comment(
        &mut self,
        new: NewComment,
        parent: Option<CommentId>,
    ) -> Result<(Comment, Event), OpError> {
        let mut tx = self.db.clone();
        let res = tree::create_comment(&mut tx, &mut self.ids, &self.policy, new, parent).await?;
        self.db = tx;
        self.relay_events(std::slice::from_ref(&res.1));
        Ok(res)
    }

    pub async fn update_comment(
        &mut self,
        id: CommentId,
        content: String,
    ) -> Result<(Comment, Event), OpError> {
        let mut tx = self.db.clone();
        let res = tree::update_comment(&mut tx, id, content).await?;
        self.db = tx;
        self.relay_events(std::slice::from_ref(&res.1));
        Ok(res)
    }

    pub async fn delete_comment(&mut self, id: CommentId) -> Result<Vec<Event>, OpError> {
        let mut tx = self.db.clone();
        let events = deletion::delete_by_id(&mut tx, id).await?;
        self.db = tx;
        self.relay_events(&events);
        Ok(events)
    }

    pub fn get_comment(&self, id: CommentId) -> Option<Comment> {
        self.db.get(&id).cloned()
    }

    pub async fn list_comments(
        &mut self,
        scope: ScopeId,
        after: Option<&CommentPath>,
        limit: usize,
    ) -> Result<Vec<Comment>, OpError> {
        Ok(self.db.list_comments(scope, after, limit).await?)
    }

    pub async fn count_comments(&mut self, scope: ScopeId) -> Result<usize, OpError> {
        Ok(self.db.count_comments(scope).await?)
    }

    pub fn threads(&self, scope: ScopeId) -> Vec<Thread> {
        self.db.threads(scope)
    }

    pub fn event_feed(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.feeds.push(sender);
        receiver
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}
