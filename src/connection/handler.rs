// src/connection/handler.rs

//! Defines the `ConnectionHandler`, which owns the read half of the transport
//! and drives the connection state machine.

use super::guard::TransportGuard;
use super::session::SessionSettings;
use crate::core::dispatch::{Dispatcher, HandlerFuture};
use crate::core::link::Link;
use crate::core::protocol::LineCodec;
use crate::core::state::ConnectionState;
use crate::core::tasks::{self, Timer};
use crate::core::{MudlinkError, metrics};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::task::Poll;
use tokio::io::AsyncRead;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

/// Processes inbound lines strictly one at a time, in arrival order.
///
/// Handler futures produced by triggers and commands are polled once as soon
/// as their line is dispatched, then parked in `in_flight` and driven by the
/// same loop. A handler that awaits a watcher therefore never holds up the
/// lines after it, including the one that resolves the watcher.
pub struct ConnectionHandler<R> {
    lines: FramedRead<R, LineCodec>,
    link: Link,
    dispatcher: Dispatcher,
    session: SessionSettings,
    timers: Vec<Timer>,
    shutdown_tx: broadcast::Sender<()>,
    session_tasks: JoinSet<()>,
    in_flight: FuturesUnordered<HandlerFuture>,
}

impl<R: AsyncRead + Unpin + Send> ConnectionHandler<R> {
    pub fn new(
        reader: R,
        codec: LineCodec,
        link: Link,
        dispatcher: Dispatcher,
        session: SessionSettings,
        timers: Vec<Timer>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            lines: FramedRead::new(reader, codec),
            link,
            dispatcher,
            session,
            timers,
            shutdown_tx,
            session_tasks: JoinSet::new(),
            in_flight: FuturesUnordered::new(),
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Runs until shutdown (`Ok`) or until the session fails: the transport
    /// is lost or authentication is rejected. Neither failure is retried.
    pub async fn run(&mut self) -> Result<(), MudlinkError> {
        let _guard = TransportGuard::new(self.link.clone());
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut attached_rx = self.link.subscribe_attached();

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Session {} received shutdown signal.", self.link.session_id());
                    break Ok(());
                }
                // The writer detaches the link when the write half fails.
                _ = detached(&mut attached_rx) => {
                    warn!("Session {}: outbound transport is gone.", self.link.session_id());
                    break Err(MudlinkError::TransportLost("outbound transport failed".into()));
                }
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.settle(outcome);
                }
                next = self.lines.next() => match next {
                    Some(Ok(line)) => {
                        if let Err(e) = self.on_line(line).await {
                            break Err(e);
                        }
                    }
                    Some(Err(e)) => {
                        if is_normal_disconnect(&e) {
                            debug!("Session {}: transport closed: {}", self.link.session_id(), e);
                        } else {
                            warn!("Session {}: transport error: {}", self.link.session_id(), e);
                        }
                        break Err(MudlinkError::TransportLost(e.to_string()));
                    }
                    None => {
                        info!("Session {}: connection closed by peer.", self.link.session_id());
                        break Err(MudlinkError::TransportLost("connection closed by peer".into()));
                    }
                }
            }
        };

        if matches!(result, Err(MudlinkError::TransportLost(_))) {
            self.link.transition(ConnectionState::Disconnected);
            self.link.detach();
        }
        // Handlers still parked on a watcher are abandoned with the session.
        self.in_flight.clear();
        self.session_tasks.shutdown().await;
        result
    }

    /// Feeds one inbound line to the state machine.
    async fn on_line(&mut self, line: String) -> Result<(), MudlinkError> {
        self.link.stats().increment_lines_received();
        metrics::LINES_RECEIVED_TOTAL.inc();

        match self.link.state() {
            ConnectionState::AwaitingLoginPrompt => {
                if line.contains(&self.session.markers.login_prompt) {
                    self.link.transition(ConnectionState::Authenticating);
                    self.link.write(self.session.credential_command.clone())?;
                }
            }
            ConnectionState::Authenticating => {
                if line.contains(&self.session.markers.auth_success) {
                    self.link.transition(ConnectionState::Active);
                    self.activate()?;
                } else if line.contains(&self.session.markers.auth_failure) {
                    self.link.transition(ConnectionState::Failed);
                    return Err(MudlinkError::AuthenticationFailed(line));
                }
            }
            ConnectionState::Active => self.dispatch(line).await,
            ConnectionState::Disconnected | ConnectionState::Failed => {}
        }
        Ok(())
    }

    /// One-time setup on entering `Active`: publish the protocol constants,
    /// then start the watcher sweep and every timer.
    fn activate(&mut self) -> Result<(), MudlinkError> {
        for template in &self.session.setup_commands {
            self.link.write(self.link.protocol().render(template))?;
        }
        tasks::spawn_session_tasks(
            &self.link,
            &self.timers,
            &self.shutdown_tx,
            &mut self.session_tasks,
        );
        info!(
            "Session {} is active: {} trigger(s), {} command(s), {} timer(s).",
            self.link.session_id(),
            self.dispatcher.triggers().len(),
            self.dispatcher.commands().len(),
            self.timers.len()
        );
        Ok(())
    }

    async fn dispatch(&mut self, line: String) {
        let dispatched = self.dispatcher.dispatch(&self.link, &line);
        let Some(mut work) = dispatched.work else {
            return;
        };
        // Run the handler up to its first suspension point before reading on.
        match futures::poll!(&mut work) {
            Poll::Ready(outcome) => self.settle(outcome),
            Poll::Pending => self.in_flight.push(work),
        }
    }

    fn settle(&self, outcome: Result<(), MudlinkError>) {
        if let Err(e) = outcome {
            if e.is_fatal() {
                // The session's own loop reports transport loss; a handler
                // only sees its echo.
                debug!("Session {}: handler stopped: {}", self.link.session_id(), e);
            } else {
                warn!("Session {}: handler failed: {}", self.link.session_id(), e);
            }
            metrics::HANDLER_FAILURES_TOTAL.inc();
            self.link.stats().increment_handler_failures();
        }
    }
}

/// Resolves once the link is marked detached.
async fn detached(attached_rx: &mut watch::Receiver<bool>) {
    let _ = attached_rx.wait_for(|attached| !*attached).await;
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &MudlinkError) -> bool {
    matches!(e, MudlinkError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}
