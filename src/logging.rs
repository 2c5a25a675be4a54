//! Logging setup
//!
//! stdout carries the hook protocol JSON, so logs go to stderr or to the
//! configured log file and never to stdout.

use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Filter from `RUST_LOG` when set, else from the configured level
pub fn env_filter(config: &Config) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_str()))
        .unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Install the global subscriber
///
/// A log file that cannot be opened falls back to stderr. Calling this
/// twice is harmless; the second call keeps the first subscriber.
pub fn init(config: &Config) {
    let filter = env_filter(config);

    let file = config.log_file_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                eprintln!("Warning: cannot open log file {}: {}", path.display(), e);
                None
            }
        }
    });

    let result = match file {
        Some(file) => fmt()
            .with_writer(Mutex::new(file))
            .with_env_filter(filter)
            .with_ansi(false)
            .try_init(),
        None => fmt()
            .with_writer(io::stderr)
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
