//! HTTP surface of the relay.
//!
//! - `GET  /api/download?url=` - progress stream (SSE) for one session
//! - `POST /api/info`          - title lookup only
//! - `GET  /api/file/{id}`     - one-shot retrieval of a finished download
//! - `GET  /health`            - liveness

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{
        sse::{KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::{stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::core::error::RelayError;
use crate::core::validation::validate_source_url;
use crate::download::emitter::EventEmitter;
use crate::download::event::ErrorPayload;
use crate::download::session::{run_session, SessionContext};
use crate::download::supervisor::Supervisor;
use crate::download::workdir::WorkDir;

/// Shared state for the web server.
#[derive(Clone)]
struct WebState {
    ctx: SessionContext,
    shutdown: CancellationToken,
}

#[derive(Debug, Deserialize)]
struct DownloadQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfoRequest {
    url: Option<String>,
}

/// Builds the router. `shutdown` ends open progress streams when it fires.
pub fn router(ctx: SessionContext, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/api/download", get(download_handler))
        .route("/api/info", post(info_handler))
        .route("/api/file/{id}", get(file_handler))
        .route("/health", get(health_handler))
        .with_state(WebState { ctx, shutdown })
}

/// Start the web server and the registry sweeper; returns after `shutdown` fires
/// and in-flight requests have drained.
pub async fn start_web_server(ctx: SessionContext, shutdown: CancellationToken) -> std::io::Result<()> {
    let addr = ctx.config.bind_address();
    let sweeper = ctx
        .registry
        .clone()
        .spawn_sweeper(ctx.config.sweep_interval(), shutdown.clone());

    let app = router(ctx.clone(), shutdown.clone());
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Starting web server on http://{}", addr);
    tracing::info!("  /api/download?url=  - Progress stream (SSE)");
    tracing::info!("  /api/info           - Title lookup");
    tracing::info!("  /api/file/{{id}}      - Finished download");
    tracing::info!("  /health             - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await?;

    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "Registry sweeper panicked");
    }
    let dropped = ctx.registry.clear();
    tracing::info!(dropped, "Web server stopped");
    Ok(())
}

fn error_response(status: StatusCode, payload: ErrorPayload) -> Response {
    (status, Json(payload)).into_response()
}

/// GET /api/download?url= - starts a session and streams its frames.
async fn download_handler(State(state): State<WebState>, Query(query): Query<DownloadQuery>) -> Response {
    let url = match validate_source_url(query.url.as_deref().unwrap_or_default()) {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected download request");
            return error_response(StatusCode::BAD_REQUEST, ErrorPayload::from(&RelayError::from(e)));
        }
    };

    let (emitter, rx) = EventEmitter::channel(state.ctx.config.event_buffer);
    tokio::spawn(run_session(state.ctx.clone(), url, emitter));

    let frames = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(event.into_sse()), rx))
    })
    .take_until(state.shutdown.clone().cancelled_owned());

    (
        [("x-accel-buffering", "no")],
        Sse::new(frames).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

/// POST /api/info - returns `{ "title": ... }`.
async fn info_handler(State(state): State<WebState>, Json(req): Json<InfoRequest>) -> Response {
    let url = match validate_source_url(req.url.as_deref().unwrap_or_default()) {
        Ok(url) => url,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, ErrorPayload::from(&RelayError::from(e))),
    };

    // Dropping this future (client gone) kills the child via kill_on_drop
    let supervisor = Supervisor::new(state.ctx.extractor.clone(), state.shutdown.child_token());
    match supervisor.fetch_title(&url).await {
        Ok(title) => Json(json!({ "title": title })).into_response(),
        Err(e) => {
            tracing::warn!(%url, error = %e, "Title lookup failed");
            error_response(StatusCode::BAD_GATEWAY, ErrorPayload::from(&e))
        }
    }
}

/// Streams a file and removes its work dir once the body is dropped.
struct ArtifactBody {
    inner: ReaderStream<fs_err::tokio::File>,
    _work_dir: WorkDir,
}

impl Stream for ArtifactBody {
    type Item = std::io::Result<axum::body::Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// GET /api/file/{id} - one-shot; the entry is consumed.
async fn file_handler(State(state): State<WebState>, Path(id): Path<String>) -> Response {
    let Some(entry) = state.ctx.registry.take(&id) else {
        return not_found();
    };
    let work_dir = WorkDir::adopt(entry.work_dir.clone());

    let file = match fs_err::tokio::File::open(&entry.artifact_path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::warn!(download_id = %id, error = %e, "Registered artifact is unreadable");
            return not_found();
        }
    };

    tracing::info!(download_id = %id, filename = %entry.filename, "Serving download");

    let body = Body::from_stream(ArtifactBody {
        inner: ReaderStream::new(file),
        _work_dir: work_dir,
    });

    let disposition = match HeaderValue::from_str(&content_disposition(&entry.filename)) {
        Ok(value) => value,
        Err(_) => HeaderValue::from_static("attachment"),
    };

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type_for(&entry.filename))),
            (header::CONTENT_LENGTH, HeaderValue::from(entry.size_bytes)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// GET /health
async fn health_handler(State(state): State<WebState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "pendingDownloads": state.ctx.registry.len(),
    }))
}

fn not_found() -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        ErrorPayload {
            message: "Download not found or expired.".to_string(),
            code: "not_found",
        },
    )
}

fn content_type_for(filename: &str) -> &'static str {
    let ext = filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("flv") => "video/x-flv",
        _ => "application/octet-stream",
    }
}

/// `attachment` header with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' || c == ' ' { c } else { '_' })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::storage::registry::{DownloadRegistry, RegistryEntry};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_ctx() -> SessionContext {
        let config = Config {
            extractor_bin: "/nonexistent/clipgrab-extractor".to_string(),
            ..Config::default()
        };
        SessionContext::new(Arc::new(config), Arc::new(DownloadRegistry::new(Duration::from_secs(300))))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_content_disposition_encodes_unicode() {
        assert_eq!(
            content_disposition("Café \"Live\".mp4"),
            "attachment; filename=\"Caf_ _Live_.mp4\"; filename*=UTF-8''Caf%C3%A9%20%22Live%22.mp4"
        );
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.MP4"), "video/mp4");
        assert_eq!(content_type_for("a.webm"), "video/webm");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_download_rejects_invalid_url() {
        let app = router(test_ctx(), CancellationToken::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/download?url=https%3A%2F%2Fexample.com%2Fvideo")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "invalid_input");
    }

    #[tokio::test]
    async fn test_download_rejects_missing_url() {
        let app = router(test_ctx(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/api/download").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_stream_has_sse_headers() {
        let app = router(test_ctx(), CancellationToken::new());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/download?url=https%3A%2F%2Fyoutu.be%2Fabc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn test_file_unknown_id_is_not_found() {
        let app = router(test_ctx(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/api/file/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["code"], "not_found");
    }

    #[tokio::test]
    async fn test_file_is_served_once_and_cleaned_up() {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("clipgrab-served");
        std::fs::create_dir(&work_dir).unwrap();
        let artifact = work_dir.join("clip.mp4");
        std::fs::write(&artifact, b"0123456789").unwrap();

        let ctx = test_ctx();
        let id = ctx.registry.register(RegistryEntry::new(
            artifact,
            "My Clip.mp4".to_string(),
            10,
            work_dir.clone(),
        ));
        let app = router(ctx, CancellationToken::new());

        let response = app
            .clone()
            .oneshot(Request::builder().uri(format!("/api/file/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"My Clip.mp4\"; filename*=UTF-8''My%20Clip.mp4"
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"0123456789");

        for _ in 0..100 {
            if !work_dir.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!work_dir.exists());

        let again = app
            .oneshot(Request::builder().uri(format!("/api/file/{}", id)).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(again.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_info_with_missing_extractor_is_bad_gateway() {
        let app = router(test_ctx(), CancellationToken::new());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/info")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"url":"https://www.youtube.com/watch?v=abc123"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(response).await["code"], "title_fetch_failed");
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(test_ctx(), CancellationToken::new());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
