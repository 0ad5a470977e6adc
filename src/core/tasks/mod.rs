// src/core/tasks/mod.rs

//! Long-running background tasks of a session: the outbound writer, the
//! watcher expiration sweep and the timers.

pub mod calendar;
pub mod outbound;
pub mod sweeper;
pub mod timer;

pub use calendar::CalendarSchedule;
pub use outbound::OutboundWriter;
pub use sweeper::WatcherSweepTask;
pub use timer::{Schedule, Timer, TimerJob, TimerTask};

use crate::core::link::Link;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Builds the keepalive timer: writes `command` every `interval`, skipping
/// firings while the transport is detached.
pub fn keepalive_timer(interval: Duration, command: impl Into<String>) -> Timer {
    let command = command.into();
    Timer::every("keepalive", interval, move |link: Link| {
        let command = command.clone();
        async move { link.write(command) }
    })
}

/// Starts the watcher expiration sweep and every timer of a session that has
/// just become active. Each task stops on `shutdown_tx` or when `tasks` is
/// dropped.
pub fn spawn_session_tasks(
    link: &Link,
    timers: &[Timer],
    shutdown_tx: &broadcast::Sender<()>,
    tasks: &mut JoinSet<()>,
) {
    tasks.spawn(WatcherSweepTask::new(link.clone()).run(shutdown_tx.subscribe()));
    for timer in timers {
        let task = TimerTask::new(timer.clone(), link.clone());
        tasks.spawn(task.run(shutdown_tx.subscribe()));
    }
}
