//! keycycle-log: tracing subscriber setup
//!
//! ```no_run
//! let _guard = keycycle_log::auto_init()?;
//! tracing::info!(account = "111122223333", "Starting run");
//! # Ok::<(), keycycle_log::LogError>(())
//! ```
//!
//! Level comes from `KEYCYCLE_LOG`, else `RUST_LOG`, else `info`. Format
//! comes from `KEYCYCLE_LOG_FORMAT` (`pretty`, `compact`, `json`). Output
//! goes to stderr so stdout stays free for command results.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Fields, Format};
pub use error::{LogError, LogResult};

/// Pick a configuration from the environment and install it.
///
/// Explicit `KEYCYCLE_LOG`/`RUST_LOG`/`KEYCYCLE_LOG_FORMAT` settings win;
/// otherwise debug builds get [`Config::development`] and release builds
/// [`Config::production`].
pub fn auto_init() -> LogResult<LoggerGuard> {
    let configured = ["KEYCYCLE_LOG", "RUST_LOG", "KEYCYCLE_LOG_FORMAT"]
        .iter()
        .any(|name| std::env::var_os(name).is_some());

    let config = if configured {
        Config::from_env()
    } else if cfg!(debug_assertions) {
        Config::development().with_fields(Fields::from_env())
    } else {
        Config::production().with_fields(Fields::from_env())
    };
    init_with(config)
}

/// Install a specific configuration
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
