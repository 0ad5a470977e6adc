// src/main.rs

//! The main entry point for the mudlink client.

use anyhow::Result;
use mudlink::client;
use mudlink::config::Config;
use mudlink::core::Registries;
use std::env;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("mudlink version {VERSION}");
        return Ok(());
    }

    // The configuration path can be provided via --config; otherwise it
    // defaults to "mudlink.toml".
    let config_path = flag_value(&args, "--config").unwrap_or("mudlink.toml");

    let mut config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };

    if let Some(host) = flag_value(&args, "--host") {
        config.host = host.to_string();
    }
    if let Some(port_str) = flag_value(&args, "--port") {
        match port_str.parse::<u16>() {
            Ok(port) if port != 0 => config.port = port,
            _ => {
                eprintln!("Invalid port number: {port_str}");
                std::process::exit(1);
            }
        }
    }
    for flag in ["--config", "--host", "--port"] {
        if args.iter().any(|a| a == flag) && flag_value(&args, flag).is_none() {
            eprintln!("{flag} flag requires a value");
            std::process::exit(1);
        }
    }

    // Get initial log level from env var or config.
    let initial_log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    // Create a reloadable filter layer; SIGHUP re-applies the configured level.
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    info!(
        "mudlink {VERSION} starting; connecting to {}:{}{}.",
        config.host,
        config.port,
        if config.tls.enabled { " over TLS" } else { "" }
    );

    // The standalone client has no extensions; it runs the configured timers.
    let registries = Registries::new();

    if let Err(e) = client::run(
        config,
        config_path.to_string(),
        registries,
        Arc::new(reload_handle),
    )
    .await
    {
        error!("Client runtime error: {:#}", e);
        return Err(e);
    }

    Ok(())
}

/// Returns the value following `flag`, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
