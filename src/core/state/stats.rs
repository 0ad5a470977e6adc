// src/core/state/stats.rs

//! Contains per-link traffic statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a single link. The Prometheus metrics are process-wide; these
/// are scoped to one session so embedding applications and tests can read them.
#[derive(Debug)]
pub struct LinkStats {
    /// The number of inbound lines read from the transport.
    lines_received: AtomicU64,
    /// The number of lines queued for the transport.
    lines_sent: AtomicU64,
    /// The number of handler futures that returned an error.
    handler_failures: AtomicU64,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStats {
    pub fn new() -> Self {
        Self {
            lines_received: AtomicU64::new(0),
            lines_sent: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
        }
    }

    pub fn increment_lines_received(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines_received(&self) -> u64 {
        self.lines_received.load(Ordering::Relaxed)
    }

    pub fn increment_lines_sent(&self) {
        self.lines_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent.load(Ordering::Relaxed)
    }

    pub fn increment_handler_failures(&self) {
        self.handler_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handler_failures(&self) -> u64 {
        self.handler_failures.load(Ordering::Relaxed)
    }
}
