//! One download session, from URL to registered artifact.
//!
//! All failures funnel into a single place in [`run_session`]: the tracker
//! moves to `Error`, exactly one error frame goes out (unless the client is
//! already gone), and the work dir guard cleans up whatever was written.

use std::sync::Arc;
use tracing::Instrument;
use url::Url;

use crate::core::config::Config;
use crate::core::error::{RelayError, RelayResult};
use crate::download::emitter::EventEmitter;
use crate::download::event::{CompletePayload, ErrorPayload, StreamEvent};
use crate::download::phase::ProgressTracker;
use crate::download::supervisor::{file_stem_for, Extractor, Supervisor};
use crate::download::workdir::WorkDir;
use crate::storage::registry::{DownloadRegistry, RegistryEntry};

/// Everything a session needs from the server
#[derive(Clone)]
pub struct SessionContext {
    pub config: Arc<Config>,
    pub registry: Arc<DownloadRegistry>,
    pub extractor: Arc<Extractor>,
}

impl SessionContext {
    pub fn new(config: Arc<Config>, registry: Arc<DownloadRegistry>) -> Self {
        let extractor = Arc::new(Extractor::from_config(&config));
        Self {
            config,
            registry,
            extractor,
        }
    }
}

/// Runs a session to completion, streaming frames through `emitter`.
///
/// Frame sequence on success: one `initializing` progress, download progress,
/// a final progress at 100, then `complete`. On failure the last frame is a
/// single `error`. The emitter is closed on return in every case.
pub async fn run_session(ctx: SessionContext, url: Url, emitter: EventEmitter) -> RelayResult<CompletePayload> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let span = tracing::info_span!("session", id = %&id[..8], %url);
    supervise(ctx, url, emitter).instrument(span).await
}

async fn supervise(ctx: SessionContext, url: Url, emitter: EventEmitter) -> RelayResult<CompletePayload> {
    let cancel = emitter.disconnected().child_token();
    let supervisor = Supervisor::new(ctx.extractor.clone(), cancel);
    let mut tracker = ProgressTracker::new();
    let timeout = ctx.config.session_timeout();

    tracing::info!("Session started");

    let result = match tokio::time::timeout(timeout, drive(&ctx, &url, &supervisor, &mut tracker, &emitter)).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::TimedOut(timeout)),
    };
    supervisor.cancel();

    match &result {
        Ok(payload) => {
            tracing::info!(
                download_id = %payload.download_id,
                file_size = payload.file_size,
                "Session complete"
            );
        }
        Err(err) => {
            tracker.fail();
            if matches!(err, RelayError::Cancelled) || emitter.is_disconnected() {
                tracing::info!("Session cancelled by client");
            } else {
                tracing::error!(error = %err, "Session failed");
                emitter.emit(StreamEvent::Error(ErrorPayload::from(err))).await;
            }
        }
    }

    emitter.close();
    result
}

async fn drive(
    ctx: &SessionContext,
    url: &Url,
    supervisor: &Supervisor,
    tracker: &mut ProgressTracker,
    emitter: &EventEmitter,
) -> RelayResult<CompletePayload> {
    emitter.emit(StreamEvent::Progress(tracker.initializing_event())).await;

    let title = supervisor.fetch_title(url).await?;
    tracing::info!(%title, "Title fetched");

    let work_dir = WorkDir::create(&ctx.config.work_root).await?;
    tracker.begin_download();

    let mut process = supervisor.spawn_download(url, work_dir.path(), &file_stem_for(&title))?;
    while let Some(line) = process.next_line().await? {
        if let Some(event) = tracker.observe(&line.text) {
            emitter.emit(StreamEvent::Progress(event)).await;
        }
    }

    let artifact = process.finish().await?;
    let size = fs_err::tokio::metadata(&artifact).await?.len();
    let ext = artifact.extension().and_then(|e| e.to_str()).unwrap_or("mp4");
    let filename = format!("{}.{}", title, ext);

    let download_id = ctx.registry.register(RegistryEntry::new(
        artifact,
        filename.clone(),
        size,
        work_dir.keep(),
    ));

    emitter.emit(StreamEvent::Progress(tracker.complete())).await;
    let payload = CompletePayload::new(download_id, filename, size);
    emitter.emit(StreamEvent::Complete(payload.clone())).await;

    Ok(payload)
}
