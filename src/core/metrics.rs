// src/core/metrics.rs

//! Defines and registers Prometheus metrics for link monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Transport ---
    /// The total number of inbound lines read from the transport.
    pub static ref LINES_RECEIVED_TOTAL: Counter =
        register_counter!("mudlink_lines_received_total", "Total number of inbound lines received.").unwrap();
    /// The total number of outbound lines written to the transport.
    pub static ref LINES_SENT_TOTAL: Counter =
        register_counter!("mudlink_lines_sent_total", "Total number of outbound lines written.").unwrap();
    /// A boolean gauge indicating if the transport is attached.
    pub static ref TRANSPORT_ATTACHED: Gauge =
        register_gauge!("mudlink_transport_attached", "Transport attached (1 for true, 0 for false).").unwrap();

    // --- Watchers ---
    /// The number of watchers currently awaiting a line.
    pub static ref WATCHERS_OUTSTANDING: Gauge =
        register_gauge!("mudlink_watchers_outstanding", "Number of outstanding watchers.").unwrap();
    /// The total number of watchers resolved by a matching line.
    pub static ref WATCHERS_RESOLVED_TOTAL: Counter =
        register_counter!("mudlink_watchers_resolved_total", "Total number of watchers resolved by a matching line.").unwrap();
    /// The total number of watchers that expired without a match.
    pub static ref WATCHERS_EXPIRED_TOTAL: Counter =
        register_counter!("mudlink_watchers_expired_total", "Total number of watchers that timed out.").unwrap();

    // --- Dispatch ---
    /// The total number of trigger firings.
    pub static ref TRIGGERS_FIRED_TOTAL: Counter =
        register_counter!("mudlink_triggers_fired_total", "Total number of trigger firings.").unwrap();
    /// The total number of dispatched commands, labeled by token.
    pub static ref COMMANDS_DISPATCHED_TOTAL: CounterVec =
        register_counter_vec!("mudlink_commands_dispatched_total", "Total number of dispatched commands, labeled by token.", &["token"]).unwrap();
    /// The total number of timer firings, labeled by timer name.
    pub static ref TIMER_FIRINGS_TOTAL: CounterVec =
        register_counter_vec!("mudlink_timer_firings_total", "Total number of timer firings, labeled by timer.", &["timer"]).unwrap();
    /// The total number of handler futures that returned an error.
    pub static ref HANDLER_FAILURES_TOTAL: Counter =
        register_counter!("mudlink_handler_failures_total", "Total number of failed trigger, command and timer handlers.").unwrap();

    // --- Histograms ---
    /// Time from watcher registration to resolution.
    pub static ref WATCHER_WAIT_SECONDS: Histogram =
        register_histogram!("mudlink_watcher_wait_seconds", "Time between registering a watcher and its matching line.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
