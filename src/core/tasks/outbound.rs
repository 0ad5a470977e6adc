// src/core/tasks/outbound.rs

use crate::core::link::Link;
use crate::core::protocol::LineCodec;
use crate::core::{MudlinkError, metrics};
use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::FramedWrite;
use tracing::{debug, info, warn};

/// Owns the write half of the transport and drains the link's outbound queue
/// into it, one CRLF-terminated line at a time, in enqueue order.
pub struct OutboundWriter<W> {
    link: Link,
    sink: FramedWrite<W, LineCodec>,
    queue: mpsc::UnboundedReceiver<String>,
}

impl<W: AsyncWrite + Unpin + Send> OutboundWriter<W> {
    pub fn new(link: Link, writer: W, queue: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            link,
            sink: FramedWrite::new(writer, LineCodec::new()),
            queue,
        }
    }

    /// Runs until shutdown or until a write fails. A failed write detaches the
    /// link, which ends the connection handler's loop, and is reported as
    /// `TransportLost`. The writer keeps a `Link` of its own, so the queue
    /// stays open for as long as the writer runs.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<(), MudlinkError> {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Outbound writer shutting down.");
                    // Best effort: push out whatever is already queued.
                    while let Ok(line) = self.queue.try_recv() {
                        if self.sink.feed(line).await.is_err() {
                            break;
                        }
                    }
                    let _ = SinkExt::<String>::flush(&mut self.sink).await;
                    return Ok(());
                }
                next = self.queue.recv() => {
                    let Some(line) = next else {
                        // Unreachable while `self.link` holds the sender.
                        debug!("Outbound queue closed; writer exiting.");
                        return Ok(());
                    };
                    if let Err(e) = self.sink.send(line).await {
                        warn!("Failed to write to transport: {}", e);
                        self.link.detach();
                        return Err(MudlinkError::TransportLost(e.to_string()));
                    }
                    metrics::LINES_SENT_TOTAL.inc();
                }
            }
        }
    }
}
