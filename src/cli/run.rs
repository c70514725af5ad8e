//! Handler for the `run` command.

use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::Result;
use crate::infrastructure::config::logging::LogFormat;
use crate::infrastructure::config::settings::{Config, StorageConfig};
use crate::infrastructure::runtime;

/// Execute the run command.
pub async fn execute(args: &RunArgs) -> Result<()> {
    let mut config = Config::load(&args.config)?;

    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }
    if args.json_logs {
        config.logging.format = LogFormat::Json;
    }
    if args.memory {
        config.storage = StorageConfig::Memory;
    }

    config.init_logging();
    info!(
        networks = config.networks.len(),
        protocols = config.protocols.len(),
        "upwatch starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    runtime::run_with_shutdown(config, shutdown_rx).await
}
