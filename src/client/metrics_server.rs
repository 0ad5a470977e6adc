// src/client/metrics_server.rs

use crate::core::link::Link;
use crate::core::metrics::{self, gather_metrics};
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{error, info};

/// Handles HTTP requests to the /metrics endpoint.
///
/// It refreshes the session gauges before gathering all registered metrics
/// and encoding them in the Prometheus text format.
async fn metrics_handler(link: Link) -> impl IntoResponse {
    metrics::WATCHERS_OUTSTANDING.set(link.watchers().len() as f64);
    metrics::TRANSPORT_ATTACHED.set(if link.is_attached() { 1.0 } else { 0.0 });

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs a simple HTTP server to expose Prometheus metrics on /metrics.
pub async fn run_metrics_server(
    link: Link,
    port: u16,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(move || metrics_handler(link.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(
        "Prometheus metrics server listening on http://{}/metrics",
        addr
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            // Metrics are optional; a busy port must not end the session.
            error!("Failed to bind metrics server on port {}: {}", port, e);
            shutdown_rx.recv().await.ok();
            return Ok(());
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Metrics server shutting down.");
        })
        .await?;
    Ok(())
}
