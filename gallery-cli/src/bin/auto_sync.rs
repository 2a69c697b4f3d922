use clap::Parser;
use core_runtime::events::EventBus;
use core_sync::ContinuousRunner;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::error;

/// Keep the gallery in sync with Google Drive until interrupted.
///
/// Every run removes local videos that disappeared remotely.
#[derive(Parser)]
#[command(name = "auto-sync", version)]
struct Cli {}

#[tokio::main]
async fn main() -> ExitCode {
    Cli::parse();

    if let Err(e) = gallery_cli::init() {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let event_bus = Arc::new(EventBus::default());
    let pipeline = match gallery_cli::bootstrap(Arc::clone(&event_bus)).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let shutdown = CancellationToken::new();
    gallery_cli::cancel_on_shutdown(shutdown.clone());

    ContinuousRunner::new(Arc::new(pipeline), event_bus)
        .run(shutdown)
        .await;

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_takes_no_arguments() {
        assert!(Cli::try_parse_from(["auto-sync"]).is_ok());
        assert!(Cli::try_parse_from(["auto-sync", "--cleanup"]).is_err());
    }
}
