//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;
pub mod web_server;

// Re-exports for convenience
pub use error::{RelayError, RelayResult};
pub use logging::init_logger;
