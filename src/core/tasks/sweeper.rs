// src/core/tasks/sweeper.rs

use crate::core::link::Link;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Periodically times out watchers whose deadline has passed, independently of
/// inbound traffic.
pub struct WatcherSweepTask {
    link: Link,
    poll_interval: Duration,
}

impl WatcherSweepTask {
    pub fn new(link: Link) -> Self {
        let poll_interval = link.settings().poll_interval;
        Self {
            link,
            poll_interval,
        }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Watcher expiration sweep started (every {:?}).",
            self.poll_interval
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let expired = self.link.watchers().expire_stale();
                    if expired > 0 {
                        debug!("Expired {} stale watcher(s).", expired);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Watcher expiration sweep shutting down.");
                    return;
                }
            }
        }
    }
}
