pub mod commands;
pub mod config;
pub mod watch;

pub use commands::{parse_enum, print_json, wait_until_connected, ThreadFilter};
pub use config::{CliConfig, IdentityOverrides};
pub use watch::{run_watch, WatchSnapshot};
