use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::core::validation::ValidationError;
use crate::download::ytdlp_errors::YtDlpErrorType;

/// Centralized error type for one download session
///
/// Every failure inside a session is converted to this enum and surfaced to the
/// client as a single `error` event. Uses `thiserror` for display formatting;
/// `code()` and `user_message()` give the client-facing short forms.
///
/// # Example
///
/// ```
/// use clipcore::RelayError;
///
/// let err = RelayError::DownloadProcessFailed {
///     code: Some(1),
///     kind: clipcore::download::ytdlp_errors::YtDlpErrorType::Unknown,
///     stderr: String::new(),
/// };
/// assert_eq!(err.code(), "download_process_failed");
/// ```
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or malformed URL; rejected before any process is spawned
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// Title-fetch invocation exited nonzero, failed to start, or hung
    #[error("Title fetch failed: {reason}")]
    TitleFetchFailed { reason: String },

    /// Download invocation could not be started (binary missing, permissions)
    #[error("Failed to start extractor: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Download invocation exited nonzero (`code` is `None` when killed by a signal)
    #[error("Extractor exited with {}: {stderr}", exit_code_label(.code))]
    DownloadProcessFailed {
        code: Option<i32>,
        kind: YtDlpErrorType,
        stderr: String,
    },

    /// Process exited zero but nothing recognizable was left in the work dir
    #[error("No output file found in {}", .0.display())]
    NoOutputFileFound(PathBuf),

    /// Peer disconnected or the session was cancelled explicitly
    #[error("Session cancelled")]
    Cancelled,

    /// Session exceeded its wall-clock allowance
    #[error("Session timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    /// IO errors (work dir creation, reading pipes, stat of the artifact)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Result with RelayError
pub type RelayResult<T> = Result<T, RelayError>;

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "a signal".to_string(),
    }
}

impl RelayError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidInput(_) => "invalid_input",
            RelayError::TitleFetchFailed { .. } => "title_fetch_failed",
            RelayError::SpawnFailed(_) => "spawn_failed",
            RelayError::DownloadProcessFailed { .. } => "download_process_failed",
            RelayError::NoOutputFileFound(_) => "no_output_file",
            RelayError::Cancelled => "cancelled",
            RelayError::TimedOut(_) => "timed_out",
            RelayError::Io(_) => "io",
        }
    }

    /// Short message suitable for direct display. Never contains raw stderr.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::InvalidInput(_) => "Please provide a valid YouTube URL.".to_string(),
            RelayError::TitleFetchFailed { .. } => {
                "Could not fetch video info. Check the URL and try again.".to_string()
            }
            RelayError::SpawnFailed(_) => "Downloader is not available on the server.".to_string(),
            RelayError::DownloadProcessFailed { code, kind, .. } => {
                format!("{} (exit {})", kind.user_message(), exit_code_label(code))
            }
            RelayError::NoOutputFileFound(_) => "Download finished but no video file was produced.".to_string(),
            RelayError::Cancelled => "Download cancelled.".to_string(),
            RelayError::TimedOut(_) => "Download took too long and was stopped.".to_string(),
            RelayError::Io(_) => "Server storage error during download.".to_string(),
        }
    }
}
