//! Wire payloads of the progress stream
//!
//! Every frame on the stream is `event: <name>\ndata: <json>\n\n`, with the JSON
//! keys in camelCase as the browser UI expects them.

use axum::response::sse::Event;
use serde::Serialize;

use crate::core::error::RelayError;
use crate::download::phase::Phase;

/// One progress update for the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub phase: Phase,
    /// Percent within the current phase, one decimal
    #[serde(rename = "percent")]
    pub phase_percent: f64,
    /// Single monotonic percent across the whole session
    pub overall_percent: u8,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub total_size: Option<String>,
    pub message: &'static str,
}

/// Sent once when the artifact is registered and ready for retrieval
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletePayload {
    pub download_id: String,
    pub filename: String,
    pub file_size: u64,
    /// Size in MiB with two decimals, e.g. `"54.24"`
    #[serde(rename = "fileSizeMB")]
    pub file_size_mb: String,
}

impl CompletePayload {
    pub fn new(download_id: String, filename: String, file_size: u64) -> Self {
        Self {
            download_id,
            filename,
            file_size,
            file_size_mb: format!("{:.2}", file_size as f64 / (1024.0 * 1024.0)),
        }
    }
}

/// Sent once when a session fails
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: &'static str,
}

impl From<&RelayError> for ErrorPayload {
    fn from(err: &RelayError) -> Self {
        Self {
            message: err.user_message(),
            code: err.code(),
        }
    }
}

/// A tagged frame on the progress stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(ProgressEvent),
    Complete(CompletePayload),
    Error(ErrorPayload),
}

impl StreamEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Progress(_) => "progress",
            StreamEvent::Complete(_) => "complete",
            StreamEvent::Error(_) => "error",
        }
    }

    /// JSON body of the frame
    pub fn data(&self) -> String {
        let json = match self {
            StreamEvent::Progress(p) => serde_json::to_string(p),
            StreamEvent::Complete(c) => serde_json::to_string(c),
            StreamEvent::Error(e) => serde_json::to_string(e),
        };
        json.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to serialize stream event");
            "{}".to_string()
        })
    }

    /// Raw text frame, terminated by a blank line
    pub fn to_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.data())
    }

    pub fn into_sse(self) -> Event {
        Event::default().event(self.name()).data(self.data())
    }
}
