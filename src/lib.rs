pub mod agent;
mod app;
pub mod config;
pub mod input;
mod lock;
pub mod runtime;
mod telemetry;
pub mod terminal_restore;
#[cfg(test)]
mod test_support;

pub use app::logging::{
    crash_log_path, init_logging, log_agent, log_debug, log_debug_content, log_file_path,
    log_panic,
};
pub(crate) use lock::lock_or_recover;
pub use telemetry::{init_tracing, tracing_log_path};
