//! Command implementations for the CLI.

mod config;
mod payload;
mod watch;

pub use config::cmd_config;
pub use payload::cmd_parse_payload;
pub use watch::{WatchArgs, cmd_watch};
