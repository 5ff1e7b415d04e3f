//! Extractor process supervision
//!
//! One session owns one [`Supervisor`], which runs yt-dlp twice, never
//! concurrently: a title fetch, then the download. Every child is spawned with
//! `kill_on_drop`, so a dropped session future cannot leave an orphan behind,
//! and every wait is raced against the session's cancellation token.

use lazy_regex::regex_is_match;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::core::config::Config;
use crate::core::error::{RelayError, RelayResult};
use crate::core::validation::sanitize_title;
use crate::download::lines::{OutputLine, OutputLines, OutputStream};
use crate::download::ytdlp_errors::analyze_ytdlp_error;

/// Best video+audio, preferring streams that merge into MP4 without re-encoding
pub const DOWNLOAD_FORMAT: &str = "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best";

/// Video containers accepted as the finished artifact, most preferred first
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "m4v", "avi", "flv"];

/// stderr lines kept for error reporting
const STDERR_TAIL_LINES: usize = 50;

/// Longest file stem derived from a title, in characters
const MAX_STEM_CHARS: usize = 100;

/// Longest file stem in UTF-8 bytes. Leaves room under the 255-byte name limit
/// for `.fNNN.ext`, `.part` and `.ytdl` suffixes.
const MAX_STEM_BYTES: usize = 200;

/// How to invoke the extractor
#[derive(Debug, Clone)]
pub struct Extractor {
    program: String,
    leading_args: Vec<String>,
    title_timeout: Duration,
}

impl Extractor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            title_timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.extractor_bin.clone())
            .with_leading_args(config.extractor_args.clone())
            .with_title_timeout(config.title_timeout())
    }

    /// Arguments placed before every argument list (`-m yt_dlp` for a Python install)
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn with_title_timeout(mut self, timeout: Duration) -> Self {
        self.title_timeout = timeout;
        self
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Argument list for the title-only invocation
pub fn title_args(url: &Url) -> Vec<String> {
    vec![
        "--get-title".to_string(),
        "--no-playlist".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

/// Argument list for the download invocation
pub fn download_args(url: &Url, output_template: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        DOWNLOAD_FORMAT.to_string(),
        "--merge-output-format".to_string(),
        "mp4".to_string(),
        "--newline".to_string(),
        "--no-playlist".to_string(),
        "-o".to_string(),
        output_template.to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

/// File stem for the output template.
///
/// Capped by characters and by UTF-8 length, always cut on a `char` boundary.
pub fn file_stem_for(title: &str) -> String {
    let mut stem = String::with_capacity(MAX_STEM_BYTES);
    for c in title.chars().take(MAX_STEM_CHARS) {
        if stem.len() + c.len_utf8() > MAX_STEM_BYTES {
            break;
        }
        stem.push(c);
    }
    stem.trim().to_string()
}

/// Owns the extractor invocations of one session.
pub struct Supervisor {
    extractor: Arc<Extractor>,
    cancel: CancellationToken,
}

impl Supervisor {
    pub fn new(extractor: Arc<Extractor>, cancel: CancellationToken) -> Self {
        Self { extractor, cancel }
    }

    /// Runs the title-only invocation and returns the sanitized title.
    pub async fn fetch_title(&self, url: &Url) -> RelayResult<String> {
        let child = self.extractor.command(&title_args(url)).spawn().map_err(|e| {
            tracing::error!(program = %self.extractor.program, error = %e, "Failed to spawn title fetch");
            RelayError::TitleFetchFailed {
                reason: format!("failed to start {}: {}", self.extractor.program, e),
            }
        })?;

        // On cancel or timeout the wait future is dropped and kill_on_drop reaps the child
        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(RelayError::Cancelled),
            waited = tokio::time::timeout(self.extractor.title_timeout, child.wait_with_output()) => waited,
        };

        let output = match waited {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RelayError::TitleFetchFailed {
                    reason: format!("title fetch process failed: {}", e),
                })
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.extractor.title_timeout.as_secs(), "Title fetch timed out");
                return Err(RelayError::TitleFetchFailed {
                    reason: format!("timed out after {}s", self.extractor.title_timeout.as_secs()),
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(code = ?output.status.code(), %stderr, "Title fetch failed");
            return Err(RelayError::TitleFetchFailed { reason: stderr });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let raw = stdout.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default();
        Ok(sanitize_title(raw))
    }

    /// Starts the download invocation writing into `work_dir`.
    pub fn spawn_download(&self, url: &Url, work_dir: &Path, file_stem: &str) -> RelayResult<DownloadProcess> {
        let template = work_dir.join(format!("{}.%(ext)s", file_stem));
        let args = download_args(url, &template);

        let mut child = self.extractor.command(&args).spawn().map_err(|e| {
            tracing::error!(program = %self.extractor.program, error = %e, "Failed to spawn download");
            RelayError::SpawnFailed(e)
        })?;
        tracing::info!(pid = ?child.id(), dir = %work_dir.display(), "Download process started");

        let lines = OutputLines::new(child.stdout.take(), child.stderr.take());

        Ok(DownloadProcess {
            child,
            lines,
            cancel: self.cancel.clone(),
            stderr_tail: VecDeque::with_capacity(STDERR_TAIL_LINES),
            work_dir: work_dir.to_path_buf(),
        })
    }

    /// Stops whatever process is live. Idempotent, and a no-op after completion.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Supervisor cancelled");
            self.cancel.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A running download invocation.
pub struct DownloadProcess {
    child: Child,
    lines: OutputLines<ChildStdout, ChildStderr>,
    cancel: CancellationToken,
    stderr_tail: VecDeque<String>,
    work_dir: PathBuf,
}

impl DownloadProcess {
    /// Next output line from stdout or stderr; `None` once both pipes are closed.
    pub async fn next_line(&mut self) -> RelayResult<Option<OutputLine>> {
        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            line = self.lines.next_line() => Some(line),
        };
        let Some(line) = next else {
            self.terminate().await;
            return Err(RelayError::Cancelled);
        };

        let line = line?;
        if let Some(ref line) = line {
            tracing::trace!(stream = ?line.stream, text = %line.text, "yt-dlp output");
            if line.stream == OutputStream::Stderr {
                if self.stderr_tail.len() == STDERR_TAIL_LINES {
                    self.stderr_tail.pop_front();
                }
                self.stderr_tail.push_back(line.text.clone());
            }
        }
        Ok(line)
    }

    /// Waits for exit and locates the produced file.
    pub async fn finish(mut self) -> RelayResult<PathBuf> {
        let waited = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            status = self.child.wait() => Some(status),
        };
        let Some(status) = waited else {
            self.terminate().await;
            return Err(RelayError::Cancelled);
        };

        let status = status?;
        if !status.success() {
            let stderr = self.stderr_tail.make_contiguous().join("\n");
            let kind = analyze_ytdlp_error(&stderr);
            tracing::warn!(code = ?status.code(), ?kind, "Download process failed");
            return Err(RelayError::DownloadProcessFailed {
                code: status.code(),
                kind,
                stderr,
            });
        }

        locate_output(&self.work_dir).await
    }

    async fn terminate(&mut self) {
        if let Err(e) = self.child.start_kill() {
            // Already exited and reaped
            tracing::debug!(error = %e, "Kill skipped");
        }
        match self.child.wait().await {
            Ok(status) => tracing::info!(?status, "Download process terminated"),
            Err(e) => tracing::warn!(error = %e, "Failed to reap download process"),
        }
    }
}

/// Finds the finished artifact in `dir`.
///
/// Skips partial/temporary files and empty files; prefers a merged file over
/// leftover per-format files (`name.f137.mp4`), then container preference order,
/// then size.
pub async fn locate_output(dir: &Path) -> RelayResult<PathBuf> {
    let mut entries = fs_err::tokio::read_dir(dir).await?;
    let mut best: Option<((bool, usize), u64, PathBuf)> = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || name.ends_with(".part") || name.ends_with(".ytdl") || name.contains(".temp.") {
            continue;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let Some(container_rank) = VIDEO_EXTENSIONS.iter().position(|v| *v == ext) else {
            continue;
        };

        let meta = fs_err::tokio::metadata(&path).await?;
        if !meta.is_file() || meta.len() == 0 {
            continue;
        }

        let is_format_fragment = regex_is_match!(r"\.f\d+\.[A-Za-z0-9]+$", name);
        let rank = (is_format_fragment, container_rank);

        let better = match &best {
            None => true,
            Some((best_rank, best_size, _)) => rank < *best_rank || (rank == *best_rank && meta.len() > *best_size),
        };
        if better {
            best = Some((rank, meta.len(), path));
        }
    }

    match best {
        Some((_, size, path)) => {
            tracing::debug!(file = %path.display(), size, "Output file located");
            Ok(path)
        }
        None => {
            tracing::error!(dir = %dir.display(), "No output file found");
            Err(RelayError::NoOutputFileFound(dir.to_path_buf()))
        }
    }
}
