// tests/integration/session_test.rs

//! Integration tests for the connection state machine
//! Tests: login handshake, setup commands, authentication failure, transport
//! loss in every state, graceful shutdown

use super::test_helpers::*;
use futures::StreamExt;
use mudlink::connection::ConnectionHandler;
use mudlink::core::commands::Kwargs;
use mudlink::core::events::LinkEvent;
use mudlink::core::protocol::LineCodec;
use mudlink::core::tasks::OutboundWriter;
use mudlink::core::{ConnectionState, LineMatch, Link, LinkSettings, MudlinkError, Registries};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;

// ===== Login =====

#[tokio::test]
async fn test_login_reaches_active() {
    let mut ctx = TestContext::new(Registries::new()).await;
    let mut events = ctx.link.subscribe();
    assert_eq!(ctx.link.state(), ConnectionState::AwaitingLoginPrompt);

    ctx.login().await;

    assert_eq!(
        events.recv().await.unwrap(),
        LinkEvent::StateChanged {
            from: ConnectionState::AwaitingLoginPrompt,
            to: ConnectionState::Authenticating,
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        LinkEvent::StateChanged {
            from: ConnectionState::Authenticating,
            to: ConnectionState::Active,
        }
    );
    assert!(ctx.link.is_attached());
}

#[tokio::test]
async fn test_noise_before_prompt_is_ignored() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.send("Welcome to the game.").await;
    ctx.send("").await;
    ctx.send("There are 3 players online.").await;
    ctx.login().await;
    assert!(ctx.link.stats().lines_received() >= 5);
}

#[tokio::test]
async fn test_unrelated_lines_while_authenticating_are_ignored() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.send(LOGIN_PROMPT).await;
    assert_eq!(ctx.recv().await, CREDENTIALS);
    ctx.wait_for_state(ConnectionState::Authenticating).await;

    ctx.send("Checking your password...").await;
    ctx.send(AUTH_SUCCESS).await;
    ctx.wait_for_state(ConnectionState::Active).await;
}

#[tokio::test]
async fn test_setup_commands_are_rendered_on_activation() {
    let mut session = default_session();
    session.setup_commands = vec![
        "@set me=prefix:{prefix}".to_string(),
        "@set me=delims:{kwarg_delimiter}{list_delimiter}".to_string(),
    ];
    let mut ctx =
        TestContext::with_settings(Registries::new(), session, LinkSettings::default()).await;

    ctx.login().await;
    assert_eq!(ctx.recv().await, "@set me=prefix:@@");
    assert_eq!(ctx.recv().await, "@set me=delims:|~||;|");
}

#[tokio::test]
async fn test_commands_before_login_are_not_dispatched() {
    let mut registries = Registries::new();
    registries.register_command("hello", |link: Link, _i: String, _k: Kwargs| async move {
        link.write("greet")
    });
    registries
        .register_trigger("^ping$", |link: Link, _l: String, _m: LineMatch| async move {
            link.write("pong")
        })
        .unwrap();
    let mut ctx = TestContext::new(registries).await;

    ctx.send("@@hello|~|#1").await;
    ctx.send("ping").await;
    ctx.login().await;

    ctx.send("ping").await;
    assert_eq!(ctx.recv().await, "pong");
}

// ===== Authentication failure =====

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.send(LOGIN_PROMPT).await;
    assert_eq!(ctx.recv().await, CREDENTIALS);
    ctx.send(AUTH_FAILURE).await;

    assert_eq!(
        ctx.finish().await,
        Err(MudlinkError::AuthenticationFailed(AUTH_FAILURE.to_string()))
    );
    assert_eq!(ctx.link.state(), ConnectionState::Failed);
    assert!(!ctx.link.is_attached());
}

#[tokio::test]
async fn test_failure_marker_outside_authenticating_is_ignored() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.send(AUTH_FAILURE).await;
    ctx.login().await;
    ctx.send(AUTH_FAILURE).await;
    ctx.send(AUTH_SUCCESS).await;
    assert_eq!(ctx.try_recv(Duration::from_millis(50)).await, None);
    assert_eq!(ctx.link.state(), ConnectionState::Active);
}

// ===== Transport loss =====

async fn assert_lost(ctx: &mut TestContext) {
    ctx.disconnect_remote().await;
    assert!(matches!(
        ctx.finish().await,
        Err(MudlinkError::TransportLost(_))
    ));
    assert_eq!(ctx.link.state(), ConnectionState::Disconnected);
    assert!(!ctx.link.is_attached());
}

#[tokio::test]
async fn test_transport_loss_while_awaiting_prompt() {
    let mut ctx = TestContext::new(Registries::new()).await;
    assert_lost(&mut ctx).await;
}

#[tokio::test]
async fn test_transport_loss_while_authenticating() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.send(LOGIN_PROMPT).await;
    assert_eq!(ctx.recv().await, CREDENTIALS);
    assert_lost(&mut ctx).await;
}

#[tokio::test]
async fn test_transport_loss_while_active() {
    let mut ctx = TestContext::new(Registries::new()).await;
    let mut events = ctx.link.subscribe();
    ctx.login().await;
    assert_lost(&mut ctx).await;

    let mut saw_detach = false;
    while let Ok(event) = events.try_recv() {
        saw_detach |= event == LinkEvent::TransportDetached;
    }
    assert!(saw_detach);
}

#[tokio::test]
async fn test_outstanding_watch_outlives_transport_loss() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.login().await;
    let handle = ctx
        .link
        .watch("^never$", Some(Duration::from_secs(60)), None)
        .unwrap();
    assert_lost(&mut ctx).await;

    // The link outlives the session, so the watcher is still outstanding and
    // only a sweep or a match can resolve it.
    assert!(ctx.link.watchers().contains(handle.id()));
}

#[tokio::test]
async fn test_write_failure_ends_session() {
    init_tracing();
    // Inbound and outbound run over separate pipes so only the write side
    // breaks: the peer that would read the client's output is already gone.
    let (client_in, mut server_out) = tokio::io::duplex(4096);
    let (client_out, server_in) = tokio::io::duplex(4096);
    drop(server_in);

    let fired = Arc::new(AtomicUsize::new(0));
    let mut registries = Registries::new();
    let counter = fired.clone();
    registries
        .register_trigger("^ping$", move |link: Link, _l: String, _m: LineMatch| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                link.write("pong")
            }
        })
        .unwrap();
    let (dispatcher, timers) = registries.freeze();

    let (shutdown_tx, _) = broadcast::channel(1);
    let (link, outbound_rx) = Link::new(LinkSettings::default());
    let writer = tokio::spawn(
        OutboundWriter::new(link.clone(), client_out, outbound_rx).run(shutdown_tx.subscribe()),
    );
    let mut handler = ConnectionHandler::new(
        client_in,
        LineCodec::new(),
        link.clone(),
        dispatcher,
        default_session(),
        timers,
        shutdown_tx.clone(),
    );
    let session = tokio::spawn(async move { handler.run().await });

    // The credential line is the first write, and it cannot be delivered.
    server_out
        .write_all(format!("{LOGIN_PROMPT}\r\n").as_bytes())
        .await
        .unwrap();
    let written = tokio::time::timeout(STEP_TIMEOUT, writer)
        .await
        .expect("writer did not stop")
        .unwrap();
    assert!(matches!(written, Err(MudlinkError::TransportLost(_))));
    assert!(!link.is_attached());

    // The session may already be gone, in which case these writes fail.
    let _ = server_out
        .write_all(format!("{AUTH_SUCCESS}\r\nping\r\nping\r\n").as_bytes())
        .await;

    let outcome = tokio::time::timeout(STEP_TIMEOUT, session)
        .await
        .expect("session did not notice the write failure")
        .unwrap();
    assert!(matches!(outcome, Err(MudlinkError::TransportLost(_))));
    assert_eq!(link.state(), ConnectionState::Disconnected);
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

// ===== Shutdown =====

#[tokio::test]
async fn test_shutdown_ends_session_cleanly() {
    let mut ctx = TestContext::new(Registries::new()).await;
    ctx.login().await;
    ctx.shutdown();

    assert_eq!(ctx.finish().await, Ok(()));
    assert_eq!(ctx.link.state(), ConnectionState::Disconnected);
    assert!(!ctx.link.is_attached());
}

#[tokio::test]
async fn test_writer_flushes_queued_lines_on_shutdown() {
    let (client_out, server_in) = tokio::io::duplex(4096);
    let (shutdown_tx, _) = broadcast::channel(1);
    let (link, outbound_rx) = Link::new(LinkSettings::default());
    let writer = OutboundWriter::new(link.clone(), client_out, outbound_rx);

    link.write("one").unwrap();
    link.write("two").unwrap();
    let shutdown_rx = shutdown_tx.subscribe();
    shutdown_tx.send(()).unwrap();
    assert_eq!(writer.run(shutdown_rx).await, Ok(()));

    let mut lines = FramedRead::new(server_in, LineCodec::new());
    assert_eq!(lines.next().await.unwrap().unwrap(), "one");
    assert_eq!(lines.next().await.unwrap().unwrap(), "two");
    assert!(lines.next().await.is_none());
}
