mod db;
pub use db::BoardDump;

mod thread;
pub use thread::Thread;

pub mod api {
    pub use board_api::*;
}
