//! Logging utilities
//!
//! The engine logs through the `log` facade. Binaries call [`init`] once;
//! `RUST_LOG` takes precedence over the configured default level.

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system with a default level filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(default_level: &str) {
    let env = env_logger::Env::default().default_filter_or(default_level);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        trace!("logger already initialized");
    }
}
