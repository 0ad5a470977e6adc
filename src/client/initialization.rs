// src/client/initialization.rs

//! Connects to the remote server and builds the session's link and tables.

use super::context::{ClientContext, LogReloadHandle};
use super::stream::AnyStream;
use crate::config::Config;
use crate::core::extension::Registries;
use crate::core::link::Link;
use anyhow::{Context, Result, anyhow};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_rustls::{TlsConnector, rustls};
use tracing::info;

/// Connects the transport and assembles the client context.
pub async fn setup(
    config: Config,
    config_path: String,
    registries: Registries,
    log_reload_handle: LogReloadHandle,
) -> Result<ClientContext> {
    let (shutdown_tx, _) = broadcast::channel(1);

    let (dispatcher, mut timers) = registries.freeze();
    timers.extend(config.timers()?);

    let stream = connect(&config).await?;
    let peer = stream
        .peer_addr()
        .map_or_else(|_| format!("{}:{}", config.host, config.port), |a| a.to_string());
    let transport = if stream.is_tls() { "TLS" } else { "plain TCP" };
    let (reader, writer) = tokio::io::split(stream);

    let (link, outbound_rx) = Link::new(config.link_settings());
    info!(
        "Session {} connected to {} over {}.",
        link.session_id(),
        peer,
        transport
    );
    let session = config.session_settings();

    Ok(ClientContext {
        config,
        config_path,
        link,
        reader: Some(reader),
        writer: Some((writer, outbound_rx)),
        dispatcher,
        timers,
        session,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        log_reload_handle,
    })
}

/// Opens the TCP connection and, if configured, performs the TLS handshake.
pub async fn connect(config: &Config) -> Result<AnyStream> {
    let addr = format!("{}:{}", config.host, config.port);
    info!("Connecting to {}", addr);
    let tcp_stream = TcpStream::connect(&addr)
        .await
        .with_context(|| format!("Failed to connect to {addr}"))?;

    if !config.tls.enabled {
        return Ok(AnyStream::Tcp(tcp_stream));
    }

    info!("Establishing TLS connection with {addr}");
    let connector = setup_tls(config)?;
    let domain = rustls::pki_types::ServerName::try_from(config.tls_server_name())
        .map_err(|_| anyhow!("Invalid TLS server name '{}'", config.tls_server_name()))?
        .to_owned();
    let tls_stream = connector
        .connect(domain, tcp_stream)
        .await
        .with_context(|| format!("TLS handshake with {addr} failed"))?;
    Ok(AnyStream::Tls(Box::new(tls_stream)))
}

/// Builds the TLS connector from the configured roots, or the web PKI roots.
fn setup_tls(config: &Config) -> Result<TlsConnector> {
    let mut root_cert_store = rustls::RootCertStore::empty();
    match &config.tls.ca_path {
        Some(path) => {
            for cert in load_certs(path)? {
                root_cert_store
                    .add(cert)
                    .with_context(|| format!("Invalid CA certificate in '{path}'"))?;
            }
        }
        None => root_cert_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_cert_store)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(tls_config)))
}

/// Loads TLS certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file = File::open(path)
        .map_err(|e| anyhow!("Failed to open certificate file '{}': {}", path, e))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("No certificates found in '{}'", path));
    }
    Ok(certs)
}
