use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use clipcore::core::validation::validate_source_url;
use clipcore::core::web_server::start_web_server;
use clipcore::download::workdir::WorkDir;
use clipcore::download::{EventEmitter, Extractor, StreamEvent, Supervisor};
use clipcore::{init_logger, run_session, Config, DownloadRegistry, SessionContext};

mod cli;

use cli::{Cli, Commands};

/// Main entry point
///
/// Parses CLI arguments, loads configuration and dispatches to the subcommand.
///
/// # Errors
/// Returns an error if configuration, logging or the chosen command fails.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env if present, before config reads them
    let _ = dotenv();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logger(&config.log_filter, config.log_file.as_deref())?;

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            let mut config = config;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            run_server(config).await
        }
        Some(Commands::Info { url }) => run_cli_info(config, url).await,
        Some(Commands::Fetch { url, output, raw }) => run_cli_fetch(config, url, output, raw).await,
        None => {
            tracing::info!("No command specified, running server");
            run_server(config).await
        }
    }
}

/// Runs the HTTP server until Ctrl-C.
async fn run_server(config: Config) -> Result<()> {
    tracing::info!(
        extractor = %config.extractor_bin,
        work_root = %config.work_root.display(),
        registry_ttl_secs = config.registry_ttl_secs,
        "Configuration loaded"
    );

    let config = Arc::new(config);
    let registry = Arc::new(DownloadRegistry::new(config.registry_ttl()));
    let ctx = SessionContext::new(config, registry);

    let shutdown = CancellationToken::new();
    spawn_ctrl_c_handler(shutdown.clone());

    start_web_server(ctx, shutdown).await.context("Web server failed")?;
    Ok(())
}

fn spawn_ctrl_c_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down gracefully...");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });
}

/// Prints the video title.
async fn run_cli_info(config: Config, url: String) -> Result<()> {
    let url = validate_source_url(&url)?;
    let supervisor = Supervisor::new(Arc::new(Extractor::from_config(&config)), CancellationToken::new());

    let title = supervisor.fetch_title(&url).await?;
    println!("{}", title);
    Ok(())
}

/// Runs one session in-process and moves the result into `output`.
async fn run_cli_fetch(config: Config, url: String, output: PathBuf, raw: bool) -> Result<()> {
    let url = validate_source_url(&url)?;
    fs_err::tokio::create_dir_all(&output).await?;

    let config = Arc::new(config);
    let registry = Arc::new(DownloadRegistry::new(config.registry_ttl()));
    let ctx = SessionContext::new(config.clone(), registry.clone());

    let (emitter, mut rx) = EventEmitter::channel(config.event_buffer);
    let session = tokio::spawn(run_session(ctx, url, emitter));

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => print_event(&event, raw),
                None => break,
            },
            _ = signal::ctrl_c() => {
                tracing::info!("Interrupted, cancelling download");
                break;
            }
        }
    }
    // On interrupt, dropping the receiver is what a closed browser tab looks like
    drop(rx);

    let payload = session.await.context("Session task panicked")??;
    let entry = registry
        .take(&payload.download_id)
        .context("Finished download vanished from the registry")?;

    // The guard removes the work dir after the artifact has been moved out
    let _work_dir = WorkDir::adopt(entry.work_dir.clone());
    let destination = output.join(&entry.filename);
    move_file(&entry.artifact_path, &destination).await?;

    println!("Saved {} ({} bytes)", destination.display(), entry.size_bytes);
    Ok(())
}

fn print_event(event: &StreamEvent, raw: bool) {
    if raw {
        print!("{}", event.to_frame());
        return;
    }
    match event {
        StreamEvent::Progress(p) => println!(
            "[{:>3}%] {}{}{}",
            p.overall_percent,
            p.message,
            p.speed.as_deref().map(|s| format!(" at {}", s)).unwrap_or_default(),
            p.eta.as_deref().map(|e| format!(", ETA {}", e)).unwrap_or_default(),
        ),
        StreamEvent::Complete(c) => println!("Done: {} ({} MB)", c.filename, c.file_size_mb),
        StreamEvent::Error(e) => eprintln!("Error: {}", e.message),
    }
}

/// Rename, falling back to copy + remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs_err::tokio::rename(from, to).await.is_ok() {
        return Ok(());
    }
    fs_err::tokio::copy(from, to).await?;
    fs_err::tokio::remove_file(from).await?;
    Ok(())
}
