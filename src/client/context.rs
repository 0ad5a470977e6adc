// src/client/context.rs

use super::stream::AnyStream;
use crate::config::Config;
use crate::connection::SessionSettings;
use crate::core::dispatch::Dispatcher;
use crate::core::link::Link;
use crate::core::tasks::Timer;
use std::sync::Arc;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing_subscriber::{filter::EnvFilter, reload};

pub type LogReloadHandle = Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>;

/// Holds everything initialized before the session loop starts.
pub struct ClientContext {
    pub config: Config,
    pub config_path: String,
    pub link: Link,
    pub reader: Option<ReadHalf<AnyStream>>,
    /// The write half and the outbound queue, taken by the spawner.
    pub writer: Option<(WriteHalf<AnyStream>, mpsc::UnboundedReceiver<String>)>,
    pub dispatcher: Dispatcher,
    pub timers: Vec<Timer>,
    pub session: SessionSettings,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
    pub log_reload_handle: LogReloadHandle,
}
