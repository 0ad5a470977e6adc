// src/client/mod.rs

use crate::config::Config;
use crate::core::extension::Registries;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;
mod stream;

pub use context::LogReloadHandle;
pub use initialization::connect;
pub use stream::AnyStream;

/// The client startup function, orchestrating all setup phases.
pub async fn run(
    config: Config,
    config_path: String,
    registries: Registries,
    log_reload_handle: LogReloadHandle,
) -> Result<()> {
    // 1. Connect the transport and build the link and its tables.
    let mut client_context =
        initialization::setup(config, config_path, registries, log_reload_handle).await?;

    // 2. Spawn the outbound writer and the metrics server.
    spawner::spawn_all(&mut client_context)?;

    // 3. Run the session. This returns once it ends or the process is signalled.
    connection_loop::run(client_context).await
}
