//! clipcore - download-progress relay behind the clipgrab web tool
//!
//! A browser asks for a video URL, the server runs `yt-dlp` twice (title, then
//! download) and streams normalized progress back over Server-Sent Events.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, URL validation, HTTP router
//! - `download`: line parser, phase tracker, process supervisor, event emitter, session
//! - `storage`: short-lived registry of finished artifacts

pub mod core;
pub mod download;
pub mod storage;

// Re-export commonly used types for convenience
pub use core::{config::Config, error::RelayError, init_logger};
pub use download::session::{run_session, SessionContext};
pub use storage::registry::DownloadRegistry;
