// src/core/mod.rs

//! The line-protocol core: connection state, watchers, triggers, commands,
//! timers and the dispatch pipeline that ties them together.

pub mod commands;
pub mod dispatch;
pub mod errors;
pub mod events;
pub mod extension;
pub mod link;
pub mod matching;
pub mod metrics;
pub mod protocol;
pub mod state;
pub mod tasks;
pub mod trigger;
pub mod watcher;

pub use commands::{Kwargs, KwargValue, ParsedCommand};
pub use dispatch::{Consumer, Dispatcher};
pub use errors::MudlinkError;
pub use extension::{Extension, Registries};
pub use link::{Link, LinkSettings};
pub use matching::{CaptureGroup, LineMatch};
pub use state::ConnectionState;
pub use tasks::{Timer, TimerJob};
pub use trigger::{Trigger, TriggerHandler};
pub use watcher::{WatchHandle, WatchResult};
