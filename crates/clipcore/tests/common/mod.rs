//! Shared helpers for integration tests: a scripted stand-in for yt-dlp.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clipcore::download::StreamEvent;
use clipcore::{Config, DownloadRegistry, SessionContext};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Shell skeleton. `--get-title` runs the title body; anything else resolves the
/// `-o` template to `$target` (with the extension set to mp4) and runs the
/// download body.
const SCRIPT_TEMPLATE: &str = r#"#!/bin/sh
for arg in "$@"; do
  if [ "$arg" = "--get-title" ]; then
__TITLE__
  fi
done
out=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then out="$arg"; fi
  prev="$arg"
done
target=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
__DOWNLOAD__
"#;

pub const TITLE_OK: &str = r#"    echo "My Test Video"; exit 0"#;

pub const TITLE_FAILS: &str = r#"    echo "ERROR: [youtube] abc123: Unsupported URL" >&2; exit 1"#;

/// Video and audio streams, then a merge
pub const DOWNLOAD_TWO_STREAMS: &str = r#"
echo "[youtube] abc123: Downloading webpage"
echo "[download] Destination: $target.f137.mp4"
echo "[download]  50.0% of 10.00MiB at  1.00MiB/s ETA 00:05"
echo "[download] 100% of 10.00MiB in 00:00:10 at 1.00MiB/s"
echo "[download] Destination: $target.f140.m4a"
echo "[download]  60.0% of 1.00MiB at  1.00MiB/s ETA 00:01"
echo "[download] 100% of 1.00MiB in 00:00:01 at 1.00MiB/s"
echo "[Merger] Merging formats into \"$target\""
printf 'fake video bytes' > "$target"
exit 0
"#;

/// One pre-merged stream
pub const DOWNLOAD_SINGLE_STREAM: &str = r#"
echo "[download] Destination: $target"
echo "[download]  50.0% of 4.00MiB at  2.00MiB/s ETA 00:01"
echo "[download] 100% of 4.00MiB in 00:00:02 at 2.00MiB/s"
printf 'single stream bytes' > "$target"
exit 0
"#;

pub const DOWNLOAD_FAILS: &str = r#"
echo "[download] Destination: $target"
echo "[download]  10.0% of 4.00MiB at  2.00MiB/s ETA 00:02"
printf 'partial' > "$target.part"
echo "ERROR: [youtube] abc123: Video unavailable. This video is private" >&2
exit 1
"#;

pub const DOWNLOAD_NOTHING: &str = r#"
echo "[download] Destination: $target"
echo "[download] 100% of 4.00MiB in 00:00:02 at 2.00MiB/s"
exit 0
"#;

pub const DOWNLOAD_HANGS: &str = r#"
echo "[download] Destination: $target"
echo "[download]  10.0% of 4.00MiB at  2.00MiB/s ETA 00:02"
printf 'partial' > "$target.part"
exec sleep 30
"#;

/// Temp dirs that must outlive the test, plus the config pointing at them
pub struct Fixture {
    _scripts: TempDir,
    work: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new(title_body: &str, download_body: &str) -> Self {
        let scripts = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();

        let script = scripts.path().join("fake-yt-dlp.sh");
        let body = SCRIPT_TEMPLATE
            .replace("__TITLE__", title_body)
            .replace("__DOWNLOAD__", download_body);
        std::fs::write(&script, body).unwrap();

        // Run through `sh` so the script needs no exec bit
        let config = Config {
            extractor_bin: "sh".to_string(),
            extractor_args: vec![script.to_string_lossy().into_owned()],
            work_root: work.path().to_path_buf(),
            ..Config::default()
        };

        Self {
            _scripts: scripts,
            work,
            config,
        }
    }

    pub fn work_root(&self) -> &Path {
        self.work.path()
    }

    pub fn context(&self) -> SessionContext {
        let config = Arc::new(self.config.clone());
        let registry = Arc::new(DownloadRegistry::new(config.registry_ttl()));
        SessionContext::new(config, registry)
    }
}

pub fn youtube_url() -> url::Url {
    url::Url::parse("https://www.youtube.com/watch?v=abc123").unwrap()
}

/// Drains the receiver until the session closes the stream.
pub async fn collect_events(mut rx: mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let collect = async {
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
    };
    tokio::time::timeout(Duration::from_secs(20), collect)
        .await
        .expect("session did not close the stream");
    events
}

pub fn names(events: &[StreamEvent]) -> Vec<&'static str> {
    events.iter().map(StreamEvent::name).collect()
}

pub fn overall_percents(events: &[StreamEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Progress(p) => Some(p.overall_percent),
            _ => None,
        })
        .collect()
}

/// Work dirs are removed on a blocking thread; poll until the root is empty.
pub async fn work_root_is_empty(root: &Path) -> bool {
    for _ in 0..200 {
        let leftovers: Vec<PathBuf> = std::fs::read_dir(root)
            .unwrap()
            .filter_map(|e| e.ok().map(|e| e.path()))
            .collect();
        if leftovers.is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
