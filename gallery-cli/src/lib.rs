//! Shared start-up for the `sync` and `auto-sync` binaries.
//!
//! Start-up order: `.env` file, logging, configuration, ffmpeg probe, remote
//! provider. Only the first four can fail; a remote that cannot be set up
//! leaves the pipeline in demo mode.

use anyhow::{Context, Result};
use bridge_desktop::{FfmpegTranscoder, ReqwestHttpClient, TokioFileSystem};
use bridge_traits::{HttpClient, StorageProvider, Transcoder};
use core_auth::token_provider_for;
use core_runtime::config::GalleryConfig;
use core_runtime::events::EventBus;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_sync::{SyncError, SyncPipeline};
use provider_google_drive::GoogleDriveConnector;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Environment variable selecting `pretty`, `json` or `compact` log output.
pub const LOG_FORMAT_VAR: &str = "GALLERY_LOG_FORMAT";

/// Load `.env` and install the tracing subscriber.
pub fn init() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let (format, format_error) = match std::env::var(LOG_FORMAT_VAR) {
        Ok(value) => match value.parse::<LogFormat>() {
            Ok(format) => (format, None),
            Err(e) => (LogFormat::default(), Some(e)),
        },
        Err(_) => (LogFormat::default(), None),
    };

    init_logging(LoggingConfig::default().with_format(format))
        .context("failed to initialise logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring .env file: {}", e),
    }
    if let Some(e) = format_error {
        warn!("Using default log format: {}", e);
    }

    Ok(())
}

/// Build a pipeline from the environment.
///
/// # Errors
///
/// Invalid configuration or a missing ffmpeg executable. Both are fatal.
pub async fn bootstrap(event_bus: Arc<EventBus>) -> Result<SyncPipeline> {
    let config = GalleryConfig::from_env().context("invalid configuration")?;
    info!(
        root = %config.root_dir.display(),
        preview = config.preview_flavor.as_str(),
        concurrency = config.max_concurrency,
        "Configuration loaded"
    );

    let transcoder = Arc::new(FfmpegTranscoder::with_program(&config.ffmpeg_path));
    transcoder.check_available().await.map_err(|e| {
        SyncError::Config(format!(
            "{} cannot be run: {}",
            config.ffmpeg_path.display(),
            e
        ))
    })?;

    let provider = remote_provider(&config).await;
    let pipeline = SyncPipeline::new(
        config,
        Arc::new(TokioFileSystem::new()),
        transcoder,
        event_bus,
    );

    Ok(match provider {
        Some(provider) => pipeline.with_provider(provider),
        None => pipeline,
    })
}

/// Google Drive connector for the configured credentials, if usable.
async fn remote_provider(config: &GalleryConfig) -> Option<Arc<dyn StorageProvider>> {
    if !config.remote_configured() {
        info!("Google Drive folder or credentials not configured, running in demo mode");
        return None;
    }

    let http: Arc<dyn HttpClient> = match ReqwestHttpClient::new() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("HTTP client unavailable, running in demo mode: {}", e);
            return None;
        }
    };

    match token_provider_for(&config.credentials, Arc::clone(&http)).await {
        Ok(Some(tokens)) => Some(Arc::new(GoogleDriveConnector::new(http, tokens))),
        Ok(None) => None,
        Err(e) => {
            warn!("Credentials unusable, running in demo mode: {}", e);
            None
        }
    }
}

/// Cancel `token` on Ctrl-C, or SIGTERM on Unix.
pub fn cancel_on_shutdown(token: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, finishing current run");
        token.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
