use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use snapsync::config::SyncConfig;
use snapsync::drive_client::DriveClient;
use snapsync::SyncAgent;

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("snapsync=info")),
        )
        .init();

    let config = SyncConfig::load().await;

    let drive = match DriveClient::from_app_config().await {
        Ok(client) => Arc::new(client),
        Err(err) => {
            error!(error = %err, "Failed to initialize the drive client");
            std::process::exit(1);
        }
    };

    let agent = match SyncAgent::new(config.clone(), drive) {
        Ok(agent) => agent,
        Err(err) => {
            error!(error = %err, "Failed to create the sync agent");
            std::process::exit(1);
        }
    };

    agent.start_background_sync();
    info!("Press Ctrl-C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for the shutdown signal");
    }

    info!("Shutting down");
    agent.stop_background_sync(STOP_TIMEOUT).await;

    if let Err(err) = config.save().await {
        warn!(error = %err, "Failed to persist configuration");
    }
}
