//! Logging setup
//!
//! Conversion runs log every line to stdout and append it to a log file, as
//! `[YYYY-MM-DD HH:MM:SS] message` in local time. `RUST_LOG` overrides the
//! default `info` filter. Colour is only used when the stream is a terminal,
//! so piped output keeps the plain line format.

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{Error, Result};

const TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %H:%M:%S]";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn timer() -> ChronoLocal {
    ChronoLocal::new(TIMESTAMP_FORMAT.to_string())
}

/// Log to stdout and append to `log_path`, creating its directory
pub fn init_with_file(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(log_path)?;

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_timer(timer())
                .with_target(false)
                .with_level(false)
                .with_ansi(io::stdout().is_terminal())
                .with_writer(io::stdout),
        )
        .with(
            fmt::layer()
                .with_timer(timer())
                .with_target(false)
                .with_level(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|e| Error::General(format!("Failed to initialize logging: {e}")))
}

/// Log to stderr only, for the one-shot inspection commands
pub fn init_stderr() -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_timer(timer())
                .with_target(false)
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr),
        )
        .try_init()
        .map_err(|e| Error::General(format!("Failed to initialize logging: {e}")))
}
