//! CLI command handlers, one file per command.

mod backoff;
mod classify;
mod config;
mod stream_demo;

pub use backoff::run_backoff;
pub use classify::run_classify;
pub use config::run_config;
pub use stream_demo::run_stream_demo;
