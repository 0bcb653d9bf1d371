use anyhow::Context;
use board_client::{
    api::{CommentId, CommentPath, NewComment, ScopeId, TreePolicy, UserId, Uuid},
    Thread,
};
use board_server::{CommentService, ServiceConfig, MIGRATOR};

#[derive(structopt::StructOpt)]
struct Opt {
    /// Postgres connection string, defaults to the DATABASE_URL environment variable
    #[structopt(long)]
    database_url: Option<String>,

    /// Deepest level a reply can be posted at, root comments being level 1
    #[structopt(long, default_value = "2")]
    max_reply_depth: usize,

    /// How many times to try allocating a path that collides with a concurrent post
    #[structopt(long, default_value = "3")]
    max_allocation_attempts: usize,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Create or upgrade the database schema
    Migrate,

    /// Post a comment, as a new thread or as a reply
    Post {
        scope: Uuid,

        author: Uuid,

        content: String,

        /// Comment to reply to
        #[structopt(long)]
        parent: Option<Uuid>,
    },

    /// Replace the content of a comment
    Edit { id: Uuid, content: String },

    /// Delete a comment, tombstoning it if it has replies
    Delete { id: Uuid },

    /// List the comments of a scope in thread order, as json lines
    List {
        scope: Uuid,

        /// Path of the last comment of the previous page
        #[structopt(long)]
        after: Option<CommentPath>,

        #[structopt(long, default_value = "50")]
        limit: usize,
    },

    /// Show the threads of a scope
    Threads { scope: Uuid },

    /// Count the comments of a scope, tombstones included
    Count { scope: Uuid },
}

impl Opt {
    fn database_url(&self) -> anyhow::Result<String> {
        match &self.database_url {
            Some(url) => Ok(url.clone()),
            None => std::env::var("DATABASE_URL").context("DATABASE_URL must be set"),
        }
    }

    fn config(&self) -> anyhow::Result<ServiceConfig> {
        Ok(ServiceConfig {
            policy: TreePolicy::new(self.max_reply_depth)?,
            max_allocation_attempts: self.max_allocation_attempts,
        })
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string(value).context("serializing output to json")?
    );
    Ok(())
}

fn print_thread(thread: &Thread) {
    for (depth, c) in thread.walk() {
        println!(
            "{:indent$}{} {}",
            "",
            c.path(),
            c.visible_content().unwrap_or("[deleted]"),
            indent = depth * 2,
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let pool = board_server::create_sqlx_pool(&opt.database_url()?).await?;
    let mut service = CommentService::new(pool, opt.config()?);

    match opt.cmd {
        Command::Migrate => {
            let mut conn = service
                .pool()
                .acquire()
                .await
                .context("getting migrator connection")?;
            MIGRATOR
                .run(&mut *conn)
                .await
                .context("applying migrations")?;
            tracing::info!("database is up to date");
        }
        Command::Post {
            scope,
            author,
            content,
            parent,
        } => {
            let new = NewComment {
                scope: ScopeId(scope),
                author_id: UserId(author),
                content,
            };
            let (comment, _) = service
                .create_comment(new, parent.map(CommentId))
                .await?;
            print_json(&comment)?;
        }
        Command::Edit { id, content } => {
            let (comment, _) = service.update_comment(CommentId(id), content).await?;
            print_json(&comment)?;
        }
        Command::Delete { id } => {
            for event in service.delete_comment(CommentId(id)).await? {
                print_json(&event)?;
            }
        }
        Command::List {
            scope,
            after,
            limit,
        } => {
            for c in service
                .list_comments(ScopeId(scope), after.as_ref(), limit)
                .await?
            {
                print_json(&c)?;
            }
        }
        Command::Threads { scope } => {
            let comments = service
                .list_comments(ScopeId(scope), None, usize::MAX)
                .await?;
            for t in Thread::build(comments) {
                print_thread(&t);
            }
        }
        Command::Count { scope } => {
            println!("{}", service.count_comments(ScopeId(scope)).await?);
        }
    }

    Ok(())
}
