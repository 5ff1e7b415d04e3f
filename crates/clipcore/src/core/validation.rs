//! URL and title validation utilities
//!
//! Provides security-focused handling of user input and extractor output:
//! - YouTube URL validation (whitelist-based) before any process is spawned
//! - Title sanitization so the title is safe in file names and HTTP headers

use thiserror::Error;
use url::Url;

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    /// No URL supplied at all
    #[error("URL is required")]
    MissingUrl,

    /// Invalid URL format or non-YouTube domain
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),
}

/// Validates that a URL is a YouTube URL and returns it parsed.
///
/// # Security
/// Uses whitelist approach:
/// - Only HTTP/HTTPS schemes allowed
/// - Only youtube.com, youtu.be, youtube-nocookie.com domains (+ subdomains)
///
/// # Examples
/// ```
/// use clipcore::core::validation::validate_source_url;
///
/// assert!(validate_source_url("https://youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
/// assert!(validate_source_url("https://youtu.be/dQw4w9WgXcQ").is_ok());
/// assert!(validate_source_url("https://m.youtube.com/watch?v=dQw4w9WgXcQ").is_ok());
///
/// assert!(validate_source_url("https://evil.com/watch?v=dQw4w9WgXcQ").is_err());
/// assert!(validate_source_url("ftp://youtube.com/video").is_err());
/// assert!(validate_source_url("not a url").is_err());
/// ```
pub fn validate_source_url(url: &str) -> Result<Url, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::MissingUrl);
    }

    let parsed = Url::parse(url).map_err(|_| ValidationError::InvalidUrl(url.to_string()))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ValidationError::InvalidUrl(format!(
            "{} (invalid scheme: {})",
            url,
            parsed.scheme()
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| ValidationError::InvalidUrl(format!("{} (no host)", url)))?;

    let is_youtube = host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtu.be"
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com");

    if !is_youtube {
        return Err(ValidationError::InvalidUrl(format!(
            "{} (not a YouTube domain: {})",
            url, host
        )));
    }

    // A bare domain has nothing to download
    if parsed.path() == "/" && parsed.query().is_none() {
        return Err(ValidationError::InvalidUrl(format!("{} (no video path)", url)));
    }

    Ok(parsed)
}

/// Sanitizes a title reported by the extractor.
///
/// Keeps alphanumerics, `_` and `-`; every run of whitespace becomes a single
/// space; everything else is dropped. Falls back to `"video"` when nothing is left.
///
/// # Examples
/// ```
/// use clipcore::core::validation::sanitize_title;
///
/// assert_eq!(sanitize_title("Rick Astley - Never Gonna Give You Up (Official)"),
///            "Rick Astley - Never Gonna Give You Up Official");
/// assert_eq!(sanitize_title("???"), "video");
/// ```
pub fn sanitize_title(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_' || *c == '-')
        .collect();

    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        "video".to_string()
    } else {
        collapsed
    }
}
