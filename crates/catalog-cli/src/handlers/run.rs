//! `run` command handler.

use anyhow::Result;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bootstrap::build_sync;
use crate::commands::RunArgs;

/// Run the supervisor until Ctrl-C.
///
/// Leadership is granted up front unless `--standby` is set. The sender
/// half of the leadership channel is held for the whole run, so an
/// election mechanism can take it over without touching the supervisor.
pub async fn execute(args: RunArgs) -> Result<()> {
    let sync = build_sync(&args).await?;

    let (leader_tx, leader_rx) = watch::channel(!args.standby);
    let cancel = CancellationToken::new();
    let signal = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, shutting down");
                    cancel.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        }
    });

    info!(
        db = %args.db.display(),
        model_configs = args.configs.model_config.len(),
        mcp_configs = args.configs.mcp_config.len(),
        standby = args.standby,
        "Starting catalog sync"
    );
    let result = sync.start(leader_rx, cancel).await;

    signal.abort();
    drop(leader_tx);
    result?;
    info!("Catalog sync stopped");
    Ok(())
}
