#![cfg(test)]

use board_api::{
    Comment, CommentId, CommentPath, Db, Error as ApiError, Event, EventData, NewComment, OpError,
    ScopeId, TreePolicy, UserId, Uuid,
};
use board_mock_server::{MockServer, SequentialIds};
use sqlx::PgPool;
use std::{cmp, collections::HashSet, fmt::Debug, ops::RangeTo, panic::AssertUnwindSafe, path::Path};

use crate::*;

fn build_pg_cluster(data: &Path) -> Option<postgresfixture::cluster::Cluster> {
    let mut runtime = None;
    let mut best_version = None;
    for r in postgresfixture::runtime::Runtime::find_on_path() {
        if let Ok(v) = r.version() {
            match (&mut runtime, &mut best_version) {
                (None, None) => {
                    runtime = Some(r);
                    best_version = Some(v);
                }
                (Some(runtime), Some(best_version)) => {
                    if *best_version < v {
                        *runtime = r;
                        *best_version = v;
                    }
                }
                _ => unreachable!(),
            }
        }
    }
    Some(postgresfixture::cluster::Cluster::new(data, runtime?))
}

macro_rules! do_sqlx_test {
    ( $name:ident, $typ:ty, $fn:expr ) => {
        #[test]
        fn $name() {
            if std::env::var("RUST_LOG").is_ok() {
                let _ = tracing_subscriber::fmt::try_init();
            }
            let lockfile = tempfile::tempfile().expect("creating tempfile");
            let datadir = tempfile::tempdir().expect("creating tempdir");
            let datadir_path: &Path = datadir.as_ref();
            let cluster = match build_pg_cluster(datadir_path) {
                Some(cluster) => cluster,
                None => {
                    eprintln!("postgresql is not installed in path, skipping {}", stringify!($name));
                    return;
                }
            };
            let datadir_path: &str = datadir_path.to_str().expect("tempdir is not valid utf8");
            postgresfixture::coordinate::run_and_destroy(&cluster, lockfile.into(), || {
                cluster.createdb("test_db").expect("creating test_db database");
                let runtime = AssertUnwindSafe(
                    tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .expect("failed initializing tokio runtime"),
                );
                // create test db
                let pool = AssertUnwindSafe(runtime.block_on(async move {
                    let pool = create_sqlx_pool(&format!("postgresql://?host={}&dbname=test_db", datadir_path)).await.expect("creating sqlx pool");
                    MIGRATOR
                        .run(&mut *pool.acquire().await.expect("getting migrator connection"))
                        .await
                        .expect("failed applying migrations");
                    pool
                }));
                bolero::check!()
                    .with_type::<$typ>()
                    .cloned()
                    .for_each(move |v| {
                        let pool = pool.clone();
                        let res = {
                            let pool = pool.clone();
                            std::panic::catch_unwind(AssertUnwindSafe(|| {
                                runtime.block_on(async move {
                                    let () = $fn(pool, v).await;
                                })
                            }))
                        };
                        runtime.block_on(async move {
                            // cleanup
                            let mut conn =
                                pool.acquire().await.expect("getting db cleanup connection");
                            sqlx::query(include_str!("../reset-test-db.sql"))
                                .execute(&mut *conn)
                                .await
                                .expect("failed cleaning up database");
                        });
                        if let Err(e) = res {
                            std::panic::resume_unwind(e);
                        }
                    });
            })
            .expect("coordinating spinup and shutdown of the pg cluster");
        }
    };
}

fn resize_int(fuzz_id: usize, RangeTo { end }: RangeTo<usize>) -> Option<usize> {
    if end == 0 {
        return None;
    }
    let bucket_size = cmp::max(1, usize::MAX / end); // in case we rounded to 0
    let id = fuzz_id / bucket_size;
    Some(cmp::min(id, end - 1)) // in case id was actually over end - 1 due to rounding
}

fn api<T>(res: Result<T, OpError>) -> Result<T, ApiError> {
    match res {
        Ok(v) => Ok(v),
        Err(OpError::Api(e)) => Err(e),
        Err(OpError::Anyhow(e)) => panic!("unexpected internal error: {e:?}"),
    }
}

fn compare<T>(name: &str, app_res: T, mock_res: T)
where
    T: Debug + PartialEq,
{
    assert_eq!(
        app_res, mock_res,
        "app and mock did not return the same result for {name}"
    );
}

/// Everything that should not depend on the storage, ie. all but timestamps
type Summary = (CommentId, ScopeId, UserId, String, CommentPath, bool);

fn summary(c: &Comment) -> Summary {
    (
        c.id(),
        c.scope(),
        c.author_id(),
        String::from(c.content()),
        c.path().clone(),
        c.is_deleted(),
    )
}

fn event_summary(e: &Event) -> (CommentId, EventData) {
    (e.comment_id, e.data.clone())
}

const SCOPES: [ScopeId; 2] = [
    ScopeId(Uuid::from_u128(1)),
    ScopeId(Uuid::from_u128(2)),
];

#[derive(Clone, Debug, bolero::generator::TypeGenerator)]
enum FuzzOp {
    Post { scope: bool, content: String },
    Reply { parent: usize, content: String },
    Edit { comment: usize, content: String },
    Delete { comment: usize },
    List { scope: bool, after: usize, limit: u8 },
}

struct ComparativeFuzzer {
    app: CommentService<SequentialIds>,
    mock: MockServer,
    known: Vec<CommentId>,
}

impl ComparativeFuzzer {
    fn new(pool: PgPool, max_reply_depth: usize) -> ComparativeFuzzer {
        let policy = TreePolicy::new(max_reply_depth).expect("building tree policy");
        let config = ServiceConfig {
            policy,
            ..ServiceConfig::default()
        };
        ComparativeFuzzer {
            app: CommentService::with_ids(pool, config, SequentialIds::default()),
            mock: MockServer::with_policy(policy),
            known: Vec::new(),
        }
    }

    fn pick(&self, fuzz_id: usize) -> Option<CommentId> {
        resize_int(fuzz_id, ..self.known.len()).map(|i| self.known[i])
    }

    async fn execute_fuzz_op(&mut self, op: FuzzOp) {
        match op {
            FuzzOp::Post { scope, content } => {
                let new = NewComment {
                    scope: SCOPES[scope as usize],
                    author_id: UserId::stub(),
                    content,
                };
                let app_res = api(self.app.create_comment(new.clone(), None).await);
                let mock_res = api(self.mock.create_comment(new, None).await);
                if let Ok((c, _)) = &mock_res {
                    self.known.push(c.id());
                }
                compare(
                    "Post",
                    app_res.map(|(c, e)| (summary(&c), event_summary(&e))),
                    mock_res.map(|(c, e)| (summary(&c), event_summary(&e))),
                );
            }
            FuzzOp::Reply { parent, content } => {
                let parent = self.pick(parent).unwrap_or_else(CommentId::stub);
                let scope = self
                    .mock
                    .get_comment(parent)
                    .map_or(SCOPES[0], |c| c.scope());
                let new = NewComment {
                    scope,
                    author_id: UserId::stub(),
                    content,
                };
                let app_res = api(self.app.create_comment(new.clone(), Some(parent)).await);
                let mock_res = api(self.mock.create_comment(new, Some(parent)).await);
                if let Ok((c, _)) = &mock_res {
                    self.known.push(c.id());
                }
                compare(
                    "Reply",
                    app_res.map(|(c, e)| (summary(&c), event_summary(&e))),
                    mock_res.map(|(c, e)| (summary(&c), event_summary(&e))),
                );
            }
            FuzzOp::Edit { comment, content } => {
                let id = self.pick(comment).unwrap_or_else(CommentId::stub);
                compare(
                    "Edit",
                    api(self.app.update_comment(id, content.clone()).await)
                        .map(|(c, e)| (summary(&c), event_summary(&e))),
                    api(self.mock.update_comment(id, content).await)
                        .map(|(c, e)| (summary(&c), event_summary(&e))),
                );
            }
            FuzzOp::Delete { comment } => {
                let id = self.pick(comment).unwrap_or_else(CommentId::stub);
                compare(
                    "Delete",
                    api(self.app.delete_comment(id).await)
                        .map(|evts| evts.iter().map(event_summary).collect::<Vec<_>>()),
                    api(self.mock.delete_comment(id).await)
                        .map(|evts| evts.iter().map(event_summary).collect::<Vec<_>>()),
                );
            }
            FuzzOp::List {
                scope,
                after,
                limit,
            } => {
                let scope = SCOPES[scope as usize];
                let after = self
                    .pick(after)
                    .and_then(|id| self.mock.get_comment(id))
                    .map(|c| c.path().clone());
                let app_res = self
                    .app
                    .list_comments(scope, after.as_ref(), limit as usize)
                    .await
                    .expect("listing comments from postgres");
                let mock_res = api(
                    self.mock
                        .list_comments(scope, after.as_ref(), limit as usize)
                        .await,
                )
                .expect("listing comments from the mock");
                compare(
                    "List",
                    app_res.iter().map(summary).collect::<Vec<_>>(),
                    mock_res.iter().map(summary).collect::<Vec<_>>(),
                );
            }
        }
    }

    async fn check_same_state(&mut self) {
        for scope in SCOPES {
            let app = self
                .app
                .list_comments(scope, None, usize::MAX)
                .await
                .expect("listing comments from postgres");
            let mock = self
                .mock
                .db()
                .comments(scope)
                .map(summary)
                .collect::<Vec<_>>();
            compare(
                "final state",
                app.iter().map(summary).collect::<Vec<_>>(),
                mock,
            );
            compare(
                "count",
                self.app
                    .count_comments(scope)
                    .await
                    .expect("counting comments in postgres"),
                self.mock.db().comments(scope).count(),
            );
        }
    }
}

do_sqlx_test!(
    compare_with_mock,
    (u8, Vec<FuzzOp>),
    |pool, (depth, ops): (u8, Vec<FuzzOp>)| async move {
        let mut fuzzer = ComparativeFuzzer::new(pool, 1 + depth as usize % 5);
        for op in ops {
            fuzzer.execute_fuzz_op(op).await;
        }
        fuzzer.check_same_state().await;
    }
);

do_sqlx_test!(
    concurrent_replies_get_distinct_paths,
    u8,
    |pool: PgPool, n: u8| async move {
        let n = 2 + n as usize % 15;
        let scope = SCOPES[0];
        let new = |content: String| NewComment {
            scope,
            author_id: UserId::stub(),
            content,
        };
        let mut service = CommentService::new(pool.clone(), ServiceConfig::default());
        let (root, _) = service
            .create_comment(new(String::from("root")), None)
            .await
            .expect("creating root");
        let parent = root.id();
        let handles = (0..n)
            .map(|i| {
                let mut service = CommentService::new(pool.clone(), ServiceConfig::default());
                let content = new(format!("reply {i}"));
                tokio::spawn(async move {
                    service
                        .create_comment(content, Some(parent))
                        .await
                        .map(|(c, _)| c.path().clone())
                })
            })
            .collect::<Vec<_>>();
        let mut paths = HashSet::new();
        for h in handles {
            let p = h.await.expect("task panicked").expect("creating reply");
            assert_eq!(p.parent().as_ref(), Some(root.path()));
            assert!(paths.insert(p));
        }
        assert_eq!(paths.len(), n);
        assert_eq!(
            service.count_comments(scope).await.expect("counting"),
            n + 1
        );
    }
);

do_sqlx_test!(duplicate_paths_are_refused, (), |pool: PgPool, ()| async move {
    let mut conn = pool.acquire().await.expect("acquiring connection");
    let mut db = PgDb(&mut *conn);
    let first = Comment::restore(
        CommentId(Uuid::from_u128(1)),
        SCOPES[0],
        UserId::stub(),
        String::from("first"),
        CommentPath::first_root(),
        false,
        chrono::Utc::now(),
    );
    db.save(&first).await.expect("saving first comment");
    let second = Comment::restore(
        CommentId(Uuid::from_u128(2)),
        SCOPES[0],
        UserId::stub(),
        String::from("second"),
        CommentPath::first_root(),
        false,
        chrono::Utc::now(),
    );
    let err = db.save(&second).await.expect_err("reusing a path");
    assert!(is_unique_violation(&err));

    // the same path in another scope is fine
    let other_scope = Comment::restore(
        CommentId(Uuid::from_u128(3)),
        SCOPES[1],
        UserId::stub(),
        String::from("elsewhere"),
        CommentPath::first_root(),
        false,
        chrono::Utc::now(),
    );
    db.save(&other_scope).await.expect("saving in another scope");
});

do_sqlx_test!(tombstone_and_cascade, (), |pool: PgPool, ()| async move {
    let mut service = CommentService::new(pool, ServiceConfig::default());
    let new = |content: &str| NewComment {
        scope: SCOPES[0],
        author_id: UserId::stub(),
        content: String::from(content),
    };
    let (a, _) = service.create_comment(new("A"), None).await.expect("posting A");
    let (b, _) = service.create_comment(new("B"), None).await.expect("posting B");
    let (c, _) = service
        .create_comment(new("C"), Some(a.id()))
        .await
        .expect("replying C");
    assert_eq!(a.path().as_str(), "00000");
    assert_eq!(b.path().as_str(), "00001");
    assert_eq!(c.path().as_str(), "0000000000");

    let events = service.delete_comment(a.id()).await.expect("deleting A");
    assert_eq!(events.iter().map(|e| e.data.clone()).collect::<Vec<_>>(), vec![EventData::Tombstoned]);
    let err = service
        .create_comment(new("late"), Some(a.id()))
        .await
        .expect_err("replying to a tombstone");
    assert_eq!(err.api(), Some(&ApiError::DeletedParentReply(a.id())));

    let events = service.delete_comment(c.id()).await.expect("deleting C");
    assert_eq!(events.len(), 2);
    let left = service
        .list_comments(SCOPES[0], None, 10)
        .await
        .expect("listing");
    assert_eq!(left.iter().map(|c| c.id()).collect::<Vec<_>>(), vec![b.id()]);
    assert_eq!(service.delete_comment(a.id()).await.expect("deleting A again"), Vec::new());
});
