//! Merged line sequence over a child's stdout and stderr.
//!
//! yt-dlp may print progress on either pipe depending on version and flags, so both
//! are read by one consumer. Order is preserved within each pipe; across pipes
//! lines come out in arrival order. `\r` ends a segment as well as `\n`, which
//! covers builds that redraw the progress line instead of printing `--newline`.

use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Split};

/// Which pipe a line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One line of extractor output, lossily decoded and trimmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

/// Finite, non-restartable sequence of lines from two pipes.
///
/// Ends (`Ok(None)`) once both pipes reached EOF.
pub struct OutputLines<O, E> {
    stdout: Option<Split<BufReader<O>>>,
    stderr: Option<Split<BufReader<E>>>,
    pending: VecDeque<OutputLine>,
}

impl<O, E> OutputLines<O, E>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    pub fn new(stdout: Option<O>, stderr: Option<E>) -> Self {
        Self {
            stdout: stdout.map(|s| BufReader::new(s).split(b'\n')),
            stderr: stderr.map(|s| BufReader::new(s).split(b'\n')),
            pending: VecDeque::new(),
        }
    }

    /// Next non-empty line from either pipe.
    ///
    /// Cancel safe: dropping the future loses no data, so it can sit in a
    /// `tokio::select!` next to a cancellation branch.
    pub async fn next_line(&mut self) -> std::io::Result<Option<OutputLine>> {
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(Some(line));
            }

            let (stream, segment) = match (&mut self.stdout, &mut self.stderr) {
                (None, None) => return Ok(None),
                (Some(out), None) => (OutputStream::Stdout, out.next_segment().await),
                (None, Some(err)) => (OutputStream::Stderr, err.next_segment().await),
                (Some(out), Some(err)) => tokio::select! {
                    biased;
                    segment = out.next_segment() => (OutputStream::Stdout, segment),
                    segment = err.next_segment() => (OutputStream::Stderr, segment),
                },
            };

            match segment? {
                Some(bytes) => self.push_segment(stream, &bytes),
                None => match stream {
                    OutputStream::Stdout => self.stdout = None,
                    OutputStream::Stderr => self.stderr = None,
                },
            }
        }
    }

    fn push_segment(&mut self, stream: OutputStream, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        for part in text.split('\r') {
            let part = part.trim();
            if !part.is_empty() {
                self.pending.push_back(OutputLine {
                    stream,
                    text: part.to_string(),
                });
            }
        }
    }
}
