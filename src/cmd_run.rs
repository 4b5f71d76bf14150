//! Foreground service: worker pool plus schedule engine.

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::adapters::Services;

/// Run until Ctrl-C.
///
/// Jobs interrupted by a previous crash are failed before the pool starts;
/// the engine performs its own recovery when it starts.
pub(crate) async fn run(services: Services) -> anyhow::Result<()> {
    let interrupted = services.queue.recover().await?;
    if interrupted > 0 {
        warn!(interrupted, "Jobs left running by a previous process were marked failed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = services.queue.start(shutdown_rx.clone());
    let engine = tokio::spawn(services.engine.clone().run(shutdown_rx));

    info!(
        max_concurrent = services.queue.config().max_concurrent,
        "genflow running, press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    if let Err(e) = engine.await {
        error!("Schedule engine task failed: {}", e);
    }
    if let Err(e) = pool.await {
        error!("Worker pool task failed: {}", e);
    }
    info!(
        jobs_processed = services.queue.worker_pool().total_processed(),
        "genflow stopped"
    );
    Ok(())
}
