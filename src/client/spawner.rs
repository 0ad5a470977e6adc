// src/client/spawner.rs

//! Spawns the client's process-level background tasks.

use super::context::ClientContext;
use super::metrics_server;
use crate::core::tasks::OutboundWriter;
use anyhow::{Result, anyhow};
use tracing::info;

/// Spawns the outbound writer and, if enabled, the metrics server.
///
/// Session tasks (the watcher sweep and the timers) are not started here; the
/// connection handler starts them once the session becomes active.
pub fn spawn_all(ctx: &mut ClientContext) -> Result<()> {
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    // --- Outbound Writer ---
    let (writer, outbound_rx) = ctx
        .writer
        .take()
        .ok_or_else(|| anyhow!("outbound writer was already spawned"))?;
    let outbound = OutboundWriter::new(ctx.link.clone(), writer, outbound_rx);
    let shutdown_rx_outbound = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        outbound.run(shutdown_rx_outbound).await?;
        Ok(())
    });

    // --- Metrics Server ---
    if ctx.config.metrics.enabled {
        let link = ctx.link.clone();
        let port = ctx.config.metrics.port;
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(async move {
            metrics_server::run_metrics_server(link, port, shutdown_rx_metrics).await
        });
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    Ok(())
}
