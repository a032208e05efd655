pub mod config;
pub mod converter;
pub mod job;
pub mod notify;
pub mod state;

pub use config::Config;
pub use job::intake::{FileSelection, MAX_FILE_SIZE};
pub use state::{Mode, Session};
