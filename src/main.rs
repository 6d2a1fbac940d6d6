//! `playlist-mirror` daemon.
//!
//! Loads configuration from the environment, registers the configured
//! playlists, runs the periodic loops and stops on Ctrl-C.

use anyhow::Context;
use core_runtime::config::MirrorConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{bootstrap_desktop, MirrorScheduler};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(logging_from_env()?).context("failed to initialise logging")?;

    let config = MirrorConfig::from_env().context("invalid configuration")?;
    info!(
        download_root = %config.download_root.display(),
        playlists = config.playlist_urls.len(),
        tool = %config.downloader_program,
        "Starting playlist mirror"
    );

    let service = bootstrap_desktop(config).context("failed to bootstrap service")?;

    // Initial refreshes run in the background; the scheduler does not wait for them.
    let initial = service.register_configured_playlists().await;
    tokio::spawn(async move {
        for task in initial {
            let id = task.playlist_id().to_string();
            if !task.wait().await.is_success() {
                warn!(playlist_id = %id, "Initial metadata refresh failed");
            }
        }
    });

    let scheduler = MirrorScheduler::start(service);

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    scheduler.shutdown().await;
    Ok(())
}

/// `LOG_FORMAT` picks pretty/json/compact; `RUST_LOG` overrides the filter.
fn logging_from_env() -> anyhow::Result<LoggingConfig> {
    let mut logging = LoggingConfig::default();
    if let Ok(format) = std::env::var("LOG_FORMAT") {
        logging = logging.with_format(format.parse::<LogFormat>()?);
    }
    if let Ok(filter) = std::env::var("RUST_LOG") {
        if !filter.trim().is_empty() {
            logging = logging.with_filter(filter);
        }
    }
    Ok(logging)
}
