// src/client/connection_loop.rs

//! Runs the session to completion and handles graceful shutdown.

use super::context::ClientContext;
use crate::config::Config;
use crate::connection::ConnectionHandler;
use crate::core::protocol::LineCodec;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::filter::EnvFilter;

/// How long the session gets to wind down after the shutdown signal.
const SESSION_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drives the session until it ends, a signal arrives, or a background task fails.
///
/// A session that ends in `TransportLost` or `AuthenticationFailed` is returned
/// as an error so the process exits non-zero and a supervisor can restart it.
pub async fn run(mut ctx: ClientContext) -> Result<()> {
    let reader = ctx
        .reader
        .take()
        .ok_or_else(|| anyhow!("session reader was already taken"))?;
    let mut handler = ConnectionHandler::new(
        reader,
        LineCodec::with_max_length(ctx.config.max_line_length),
        ctx.link.clone(),
        ctx.dispatcher.clone(),
        ctx.session.clone(),
        std::mem::take(&mut ctx.timers),
        ctx.shutdown_tx.clone(),
    );

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;
    let mut sighup = signal(SignalKind::hangup())
        .map_err(|e| anyhow!("Failed to register SIGHUP handler: {}", e))?;

    let span = info_span!("session", id = %ctx.link.session_id(), host = %ctx.config.host);
    let session = handler.run().instrument(span);
    tokio::pin!(session);
    let mut session_finished = false;

    let outcome: Result<()> = loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break Ok(());
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break Ok(());
            }
            _ = sighup.recv() => {
                reload_log_level(&ctx);
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break Err(e); }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break Err(anyhow!("background task panicked")); }
                }
            },

            res = &mut session => {
                session_finished = true;
                match res {
                    Ok(()) => break Ok(()),
                    Err(e) => {
                        error!("CRITICAL: Session ended: {}. Exiting.", e);
                        break Err(e.into());
                    }
                }
            }
        }
    };

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        warn!("No task was listening for the shutdown signal.");
    }

    if !session_finished
        && tokio::time::timeout(SESSION_DRAIN_TIMEOUT, &mut session)
            .await
            .is_err()
    {
        warn!("Timed out waiting for the session to wind down.");
    }

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Client shutdown complete.");
    outcome
}

/// Re-reads `log_level` from the config file and applies it, unless `RUST_LOG`
/// is set.
fn reload_log_level(ctx: &ClientContext) {
    if std::env::var("RUST_LOG").is_ok() {
        info!("SIGHUP received, but RUST_LOG is set; keeping the current log filter.");
        return;
    }
    let level = match Config::from_file(&ctx.config_path) {
        Ok(config) => config.log_level,
        Err(e) => {
            warn!("SIGHUP received, but the config could not be reloaded: {:#}", e);
            return;
        }
    };
    match ctx.log_reload_handle.reload(EnvFilter::new(&level)) {
        Ok(()) => info!("SIGHUP received, log level set to '{}'.", level),
        Err(e) => warn!("Failed to reload log filter: {}", e),
    }
}
