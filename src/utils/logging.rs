//! Logging setup for the command-line shell.
//!
//! The library only talks to the `log` facade; this installs `env_logger`
//! behind it. `RUST_LOG` still wins over the defaults chosen here.

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the global logger. Calling it twice is harmless.
pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };

    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("hyper_util", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .format_timestamp_secs()
        .try_init();
}
