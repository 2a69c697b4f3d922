use clap::Parser;
use core_runtime::events::EventBus;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

/// Mirror the configured Google Drive folder once and publish videos.json.
#[derive(Parser)]
#[command(name = "sync", version)]
struct Cli {
    /// Delete local videos that are no longer in the remote folder
    #[arg(long)]
    cleanup: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = gallery_cli::init() {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let pipeline = match gallery_cli::bootstrap(Arc::new(EventBus::default())).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match pipeline.run(cli.cleanup).await {
        Ok(report) if report.is_demo() => {
            info!("Published {} local videos in demo mode", report.manifest.count);
        }
        Ok(report) => info!("Published {} videos", report.manifest.count),
        Err(e) => error!("Sync did not complete: {}", e),
    }

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cleanup_flag() {
        assert!(Cli::parse_from(["sync", "--cleanup"]).cleanup);
        assert!(!Cli::parse_from(["sync"]).cleanup);
        assert!(Cli::try_parse_from(["sync", "--demo"]).is_err());
    }
}
