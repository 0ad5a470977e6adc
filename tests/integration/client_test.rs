// tests/integration/client_test.rs

//! Integration tests for the client over a real TCP socket
//! Tests: connect, full run from a config, exit status on transport loss

use super::test_helpers::*;
use futures::{SinkExt, StreamExt};
use mudlink::client;
use mudlink::config::Config;
use mudlink::core::Registries;
use mudlink::core::protocol::LineCodec;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing_subscriber::{EnvFilter, reload};

async fn listener() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn test_connect_plain_tcp() {
    let (listener, port) = listener().await;
    let config = Config::from_toml(&format!("port = {port}")).unwrap();

    let (stream, accepted) = tokio::join!(client::connect(&config), listener.accept());
    let stream = stream.unwrap();
    let (_, client_addr) = accepted.unwrap();
    assert!(matches!(stream, client::AnyStream::Tcp(_)));
    assert!(!stream.is_tls());
    assert_eq!(stream.peer_addr().unwrap().port(), port);
    assert_eq!(client_addr.ip().to_string(), "127.0.0.1");
}

#[tokio::test]
async fn test_connect_refused_is_an_error() {
    let (listener, port) = listener().await;
    drop(listener);
    let config = Config::from_toml(&format!("port = {port}")).unwrap();
    assert!(client::connect(&config).await.is_err());
}

#[tokio::test]
async fn test_run_full_session_from_config() {
    init_tracing();
    let (listener, port) = listener().await;
    let config = Config::from_toml(&format!(
        r#"
        port = {port}

        [credentials]
        username = "bot"
        password = "secret"

        [protocol]
        setup_commands = ["@set me=prefix:{{prefix}}"]

        [keepalive]
        interval = "1h"
        command = "IDLE"
        "#
    ))
    .unwrap();

    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut lines = Framed::new(socket, LineCodec::new());
        lines.send(LOGIN_PROMPT).await.unwrap();
        let credentials = lines.next().await.unwrap().unwrap();
        lines.send(AUTH_SUCCESS).await.unwrap();
        let setup = lines.next().await.unwrap().unwrap();
        let keepalive = lines.next().await.unwrap().unwrap();
        // Hanging up ends the session.
        (credentials, setup, keepalive)
    });

    let (_, reload_handle) = reload::Layer::new(EnvFilter::new("warn"));
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        client::run(
            config,
            "mudlink.toml".to_string(),
            Registries::new(),
            Arc::new(reload_handle),
        ),
    )
    .await
    .expect("client did not exit after the server hung up");

    let (credentials, setup, keepalive) = server.await.unwrap();
    assert_eq!(credentials, "connect bot secret");
    assert_eq!(setup, "@set me=prefix:@@");
    assert_eq!(keepalive, "IDLE");

    let err = outcome.unwrap_err();
    assert!(err.to_string().contains("Transport lost"), "{err:#}");
}
