//! Classification of yt-dlp failures
//!
//! Looks at the captured stderr tail of a failed invocation and picks a category,
//! so the client gets a useful short message instead of raw extractor output.

use serde::Serialize;

/// yt-dlp error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum YtDlpErrorType {
    /// YouTube asked to sign in / flagged the request as a bot
    BotDetection,
    /// Private, removed, or region-blocked video
    VideoUnavailable,
    /// Timeouts, DNS, connection resets
    NetworkError,
    /// Requested formats could not be merged or post-processed (ffmpeg missing, etc.)
    PostprocessingError,
    /// Out of disk space while writing
    DiskSpaceError,
    Unknown,
}

/// Analyzes yt-dlp stderr and determines the error category
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("http error 429")
        || stderr_lower.contains("signature extraction failed")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video is private")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
        || stderr_lower.contains("not available in your country")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("no space left on device") {
        return YtDlpErrorType::DiskSpaceError;
    }

    if stderr_lower.contains("postprocessing")
        || stderr_lower.contains("ffmpeg not found")
        || stderr_lower.contains("ffprobe and ffmpeg not found")
    {
        return YtDlpErrorType::PostprocessingError;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network is unreachable")
        || stderr_lower.contains("name or service not known")
        || stderr_lower.contains("temporary failure in name resolution")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

impl YtDlpErrorType {
    /// Short message for the client
    pub fn user_message(&self) -> &'static str {
        match self {
            YtDlpErrorType::BotDetection => "YouTube blocked the request. Try again later.",
            YtDlpErrorType::VideoUnavailable => "Video is unavailable (private, removed, or region-blocked).",
            YtDlpErrorType::NetworkError => "Network problem while downloading. Try again in a minute.",
            YtDlpErrorType::PostprocessingError => "Could not merge video and audio on the server.",
            YtDlpErrorType::DiskSpaceError => "Server ran out of disk space.",
            YtDlpErrorType::Unknown => "Download failed.",
        }
    }
}
