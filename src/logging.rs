//! Process-wide `tracing` subscriber.

use thiserror::Error;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

/// Errors from [`init_logging`].
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The level is not one of `trace`, `debug`, `info`, `warn`, `error`, `off`.
    #[error("Invalid log level '{value}'")]
    InvalidLevel {
        /// The rejected level.
        value: String,
    },
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `level` when it is unset.
///
/// Returns `Ok(false)` if a global subscriber was already installed.
///
/// # Errors
/// `InvalidLevel` if `level` is not a tracing level.
pub fn init_logging(level: &str) -> Result<bool, LoggingError> {
    let level: LevelFilter = level.parse().map_err(|_| LoggingError::InvalidLevel {
        value: level.to_string(),
    })?;
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    Ok(tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok())
}
