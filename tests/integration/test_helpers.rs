// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use futures::StreamExt;
use mudlink::connection::{ConnectionHandler, SessionSettings};
use mudlink::core::protocol::LineCodec;
use mudlink::core::tasks::OutboundWriter;
use mudlink::core::{ConnectionState, Link, LinkSettings, MudlinkError, Registries};
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

/// How long a helper waits for the client before failing the test.
pub const STEP_TIMEOUT: Duration = Duration::from_secs(2);

pub const LOGIN_PROMPT: &str = "Welcome! Connect with 'connect <name> <password>'.";
pub const CREDENTIALS: &str = "connect bot secret";
pub const AUTH_SUCCESS: &str = "*** Connected ***";
pub const AUTH_FAILURE: &str = "Either that player does not exist, or has a different password.";

/// TestContext plays the remote server against a real session running over an
/// in-memory duplex pipe.
pub struct TestContext {
    pub link: Link,
    /// The server's view of what the client wrote.
    from_client: FramedRead<ReadHalf<DuplexStream>, LineCodec>,
    /// The server's write side; what it writes, the client reads.
    to_client: WriteHalf<DuplexStream>,
    shutdown_tx: broadcast::Sender<()>,
    session: Option<JoinHandle<Result<(), MudlinkError>>>,
    writer: JoinHandle<Result<(), MudlinkError>>,
}

pub fn default_session() -> SessionSettings {
    SessionSettings {
        credential_command: CREDENTIALS.to_string(),
        ..Default::default()
    }
}

impl TestContext {
    /// Creates a session with the given tables and default settings.
    pub async fn new(registries: Registries) -> Self {
        Self::with_settings(registries, default_session(), LinkSettings::default()).await
    }

    /// Creates a session with custom settings.
    pub async fn with_settings(
        registries: Registries,
        session: SessionSettings,
        settings: LinkSettings,
    ) -> Self {
        init_tracing();

        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client);
        let (server_read, server_write) = tokio::io::split(server);

        let (shutdown_tx, _) = broadcast::channel(1);
        let (link, outbound_rx) = Link::new(settings);
        let (dispatcher, timers) = registries.freeze();

        let writer = tokio::spawn(
            OutboundWriter::new(link.clone(), client_write, outbound_rx)
                .run(shutdown_tx.subscribe()),
        );

        let mut handler = ConnectionHandler::new(
            client_read,
            LineCodec::new(),
            link.clone(),
            dispatcher,
            session,
            timers,
            shutdown_tx.clone(),
        );
        let session = tokio::spawn(async move { handler.run().await });

        Self {
            link,
            from_client: FramedRead::new(server_read, LineCodec::new()),
            to_client: server_write,
            shutdown_tx,
            session: Some(session),
            writer,
        }
    }

    /// Writes one line to the client.
    pub async fn send(&mut self, line: &str) {
        self.to_client
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("failed to write to client");
    }

    /// Reads the next line the client wrote.
    pub async fn recv(&mut self) -> String {
        tokio::time::timeout(STEP_TIMEOUT, self.from_client.next())
            .await
            .expect("timed out waiting for the client")
            .expect("client closed its write side")
            .expect("client wrote an undecodable line")
    }

    /// Returns the next line if one arrives within `wait`.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<String> {
        match tokio::time::timeout(wait, self.from_client.next()).await {
            Ok(Some(Ok(line))) => Some(line),
            _ => None,
        }
    }

    /// Drives the client through the login handshake.
    pub async fn login(&mut self) {
        self.send(LOGIN_PROMPT).await;
        assert_eq!(self.recv().await, CREDENTIALS);
        self.send(AUTH_SUCCESS).await;
        self.wait_for_state(ConnectionState::Active).await;
    }

    pub async fn wait_for_state(&self, state: ConnectionState) {
        let mut rx = self.link.subscribe_state();
        tokio::time::timeout(STEP_TIMEOUT, rx.wait_for(|s| *s == state))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for state {state}"))
            .expect("state channel closed");
    }

    /// Closes the server's write side, so the client reads end-of-stream.
    pub async fn disconnect_remote(&mut self) {
        self.to_client
            .shutdown()
            .await
            .expect("failed to shut down the pipe");
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Waits for the session to end and returns how it ended.
    pub async fn finish(&mut self) -> Result<(), MudlinkError> {
        let session = self.session.take().expect("session already finished");
        tokio::time::timeout(STEP_TIMEOUT, session)
            .await
            .expect("timed out waiting for the session to end")
            .expect("session task panicked")
    }

    pub fn writer_finished(&self) -> bool {
        self.writer.is_finished()
    }
}

impl Drop for TestContext {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(session) = self.session.take() {
            session.abort();
        }
    }
}

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
