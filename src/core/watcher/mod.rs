// src/core/watcher/mod.rs

//! The response correlation manager.
//!
//! A watcher is a one-shot, deadline-bound subscription for a single inbound
//! line. Many watchers may be outstanding at once over the same stream; each
//! inbound line resolves at most one of them, the earliest-registered watcher
//! whose pattern matches. A watcher leaves the outstanding set exactly once:
//! either a line matched it or the expiration sweep timed it out.
//!
//! # Locking
//!
//! `match_line` runs on the dispatch flow while `watch` may be called from any
//! task (handlers, timers) and the sweep runs on its own interval, so the set is
//! kept behind a `parking_lot::Mutex`. Watchers are always removed from the set
//! under the lock and resolved after it is released, so a resolution that wakes
//! a caller who immediately registers a new watcher can never observe the set
//! mid-iteration.

mod handle;

pub use handle::{WatchHandle, WatchResult};

use crate::core::matching::{CaptureGroup, LineMatch};
use crate::core::{MudlinkError, metrics};
use indexmap::IndexMap;
use parking_lot::Mutex;
use regex::Regex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::debug;

/// A single outstanding subscription.
#[derive(Debug)]
struct Watcher {
    pattern: Regex,
    capture: Option<CaptureGroup>,
    registered_at: Instant,
    deadline: Instant,
    timeout: Duration,
    waker: oneshot::Sender<WatchResult>,
}

impl Watcher {
    fn resolve(self, result: WatchResult) {
        // The caller may have dropped its handle; the line is consumed regardless.
        if self.waker.send(result).is_err() {
            debug!(
                "Watcher for '{}' resolved after its handle was dropped.",
                self.pattern.as_str()
            );
        }
    }
}

/// Owns every outstanding watcher for one session, in registration order.
#[derive(Debug, Default)]
pub struct WatcherRegistry {
    watchers: Mutex<IndexMap<u64, Watcher>>,
    next_id: AtomicU64,
}

impl WatcherRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a watcher and returns its handle immediately.
    ///
    /// The deadline is `now + timeout`. If `capture` is given, the handle
    /// resolves with only that group's text; otherwise with the full match.
    pub fn watch(
        &self,
        pattern: Regex,
        timeout: Duration,
        capture: Option<CaptureGroup>,
    ) -> WatchHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let handle = WatchHandle::new(id, pattern.as_str().to_string(), rx);
        let watcher = Watcher {
            pattern,
            capture,
            registered_at: now,
            deadline: now + timeout,
            timeout,
            waker: tx,
        };
        self.watchers.lock().insert(id, watcher);
        metrics::WATCHERS_OUTSTANDING.inc();
        handle
    }

    /// Compiles `pattern` and registers a watcher for it.
    pub fn watch_str(
        &self,
        pattern: &str,
        timeout: Duration,
        capture: Option<CaptureGroup>,
    ) -> Result<WatchHandle, MudlinkError> {
        let pattern = Regex::new(pattern)?;
        Ok(self.watch(pattern, timeout, capture))
    }

    /// Offers an inbound line to the outstanding watchers.
    ///
    /// The first watcher in registration order whose pattern matches is removed
    /// and resolved, and `true` is returned. If nothing matches, the set is left
    /// untouched and `false` is returned.
    pub fn match_line(&self, line: &str) -> bool {
        let hit = {
            let mut watchers = self.watchers.lock();
            let found = watchers
                .iter()
                .find(|(_, w)| w.pattern.is_match(line))
                .map(|(id, _)| *id);
            // `shift_remove` keeps the remaining watchers in registration order.
            found.and_then(|id| watchers.shift_remove(&id))
        };

        let Some(watcher) = hit else {
            return false;
        };

        metrics::WATCHERS_OUTSTANDING.dec();
        metrics::WATCHERS_RESOLVED_TOTAL.inc();
        metrics::WATCHER_WAIT_SECONDS.observe(watcher.registered_at.elapsed().as_secs_f64());

        let result = match LineMatch::search(&watcher.pattern, line) {
            Some(m) => m.select(watcher.capture.as_ref()),
            None => Err(MudlinkError::Internal(
                "watcher pattern stopped matching its own line".into(),
            )),
        };
        watcher.resolve(result);
        true
    }

    /// Times out every watcher whose deadline has passed. Returns how many expired.
    pub fn expire_stale(&self) -> usize {
        self.expire_stale_at(Instant::now())
    }

    /// As `expire_stale`, against an explicit clock reading.
    pub fn expire_stale_at(&self, now: Instant) -> usize {
        let expired: Vec<Watcher> = {
            let mut watchers = self.watchers.lock();
            let stale_ids: Vec<u64> = watchers
                .iter()
                .filter(|(_, w)| w.deadline <= now)
                .map(|(id, _)| *id)
                .collect();
            stale_ids
                .iter()
                .filter_map(|id| watchers.shift_remove(id))
                .collect()
        };

        let count = expired.len();
        for watcher in expired {
            metrics::WATCHERS_OUTSTANDING.dec();
            metrics::WATCHERS_EXPIRED_TOTAL.inc();
            let pattern = watcher.pattern.as_str().to_string();
            debug!(
                "Watcher for '{}' expired after {:?} without a match.",
                pattern, watcher.timeout
            );
            let timeout = watcher.timeout;
            watcher.resolve(Err(MudlinkError::WatcherTimeout { pattern, timeout }));
        }
        count
    }

    /// Returns true if the watcher with this id is still outstanding.
    pub fn contains(&self, id: u64) -> bool {
        self.watchers.lock().contains_key(&id)
    }

    /// The ids of the outstanding watchers, in registration order.
    pub fn outstanding_ids(&self) -> Vec<u64> {
        self.watchers.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.watchers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.lock().is_empty()
    }
}

impl Drop for WatcherRegistry {
    fn drop(&mut self) {
        let remaining = self.watchers.get_mut().len();
        if remaining > 0 {
            // The handles observe `WatcherDropped` once their senders go away.
            metrics::WATCHERS_OUTSTANDING.sub(remaining as f64);
        }
    }
}
