//! Logging initialization
//!
//! Console output always, plus an optional plain-text log file.
//! `RUST_LOG` takes precedence over the configured filter.

use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log file: {0}")]
    LogFile(#[from] std::io::Error),

    #[error("Failed to initialize logger: {0}")]
    Init(#[from] TryInitError),
}

/// Initialize the global tracing subscriber for console and (optionally) file output
///
/// # Arguments
/// * `default_filter` - Filter used when `RUST_LOG` is unset (e.g. `"info"`)
/// * `log_file_path` - Optional path of a log file, truncated on start
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(LoggingError)` - Log file could not be created, or a subscriber is already set
pub fn init_logger(default_filter: &str, log_file_path: Option<&Path>) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let file_layer = match log_file_path {
        Some(path) => {
            let file = fs_err::File::create(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Mutex::new(file.into_parts().0)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(file_layer)
        .try_init()?;

    Ok(())
}
