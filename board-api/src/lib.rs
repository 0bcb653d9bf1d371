use chrono::Utc;

pub use uuid::{uuid, Uuid};
pub type Time = chrono::DateTime<Utc>;

pub const STUB_UUID: Uuid = uuid!("ffffffff-ffff-ffff-ffff-ffffffffffff");

mod comment;
pub use comment::{Comment, CommentId, NewComment};

mod db;
pub use db::{Db, IdGenerator, RandomIds};

pub mod deletion;
pub use deletion::Deletion;

mod error;
pub use error::{Error, OpError};

mod event;
pub use event::{Event, EventData, EventId};

pub mod path;
pub use path::{CommentPath, CHUNK_SIZE, MAX_DEPTH};

mod policy;
pub use policy::TreePolicy;

mod scope;
pub use scope::ScopeId;

pub mod tree;


mod user;
pub use user::UserId;

// Strings end up in postgres text columns, which cannot hold null bytes. This
// is the only restriction on free-form text.
pub fn validate_string(s: &str) -> Result<(), Error> {
    match s.contains('\0') {
        true => Err(Error::NullByteInString(String::from(s))),
        false => Ok(()),
    }
}
