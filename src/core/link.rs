// src/core/link.rs

//! Defines `Link`, the cloneable handle every collaborator receives.
//!
//! A link is the programmatic surface of one session: it writes outbound
//! lines, registers watchers, exposes the connection state and carries the
//! session's event bus. It holds no reference to the read half of the
//! transport; inbound lines only ever flow through the connection handler.

use crate::core::events::{EventBus, LinkEvent};
use crate::core::matching::CaptureGroup;
use crate::core::protocol::ProtocolConstants;
use crate::core::state::{ConnectionState, LinkStats};
use crate::core::watcher::{WatchHandle, WatchResult, WatcherRegistry};
use crate::core::{MudlinkError, metrics};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info};
use uuid::Uuid;

/// The default time a watcher waits for its line.
pub const DEFAULT_WATCHER_TIMEOUT: Duration = Duration::from_secs(10);
/// The default interval of the watcher expiration sweep.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// The parts of the configuration the core consumes directly.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkSettings {
    pub protocol: ProtocolConstants,
    /// Used when a watcher is registered without an explicit timeout.
    pub default_timeout: Duration,
    /// How often the expiration sweep checks watcher deadlines.
    pub poll_interval: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            protocol: ProtocolConstants::default(),
            default_timeout: DEFAULT_WATCHER_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug)]
struct Shared {
    session_id: Uuid,
    settings: LinkSettings,
    outbound: mpsc::UnboundedSender<String>,
    watchers: WatcherRegistry,
    events: EventBus,
    stats: LinkStats,
    attached: watch::Sender<bool>,
    state: watch::Sender<ConnectionState>,
}

/// A cheap, cloneable handle to one session.
#[derive(Debug, Clone)]
pub struct Link {
    shared: Arc<Shared>,
}

impl Link {
    /// Creates a link and the receiving end of its outbound queue. Whoever owns
    /// the write half of the transport drains the receiver.
    pub fn new(settings: LinkSettings) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::default());
        let (attached, _) = watch::channel(true);
        let link = Self {
            shared: Arc::new(Shared {
                session_id: Uuid::new_v4(),
                settings,
                outbound,
                watchers: WatcherRegistry::new(),
                events: EventBus::new(),
                stats: LinkStats::new(),
                attached,
                state,
            }),
        };
        metrics::TRANSPORT_ATTACHED.set(1.0);
        (link, outbound_rx)
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn settings(&self) -> &LinkSettings {
        &self.shared.settings
    }

    pub fn protocol(&self) -> &ProtocolConstants {
        &self.shared.settings.protocol
    }

    /// Queues one line for the transport. Never blocks.
    pub fn write(&self, line: impl Into<String>) -> Result<(), MudlinkError> {
        let line = line.into();
        debug!("Session {}: -> {}", self.shared.session_id, line);
        self.shared
            .outbound
            .send(line)
            .map_err(|_| MudlinkError::TransportLost("outbound queue is closed".into()))?;
        self.shared.stats.increment_lines_sent();
        Ok(())
    }

    /// Registers a watcher for `pattern`. `None` for `timeout` uses the
    /// configured default.
    pub fn watch(
        &self,
        pattern: &str,
        timeout: Option<Duration>,
        capture: Option<CaptureGroup>,
    ) -> Result<WatchHandle, MudlinkError> {
        self.shared.watchers.watch_str(
            pattern,
            timeout.unwrap_or(self.shared.settings.default_timeout),
            capture,
        )
    }

    /// Registers a watcher for an already compiled pattern.
    pub fn watch_regex(
        &self,
        pattern: Regex,
        timeout: Option<Duration>,
        capture: Option<CaptureGroup>,
    ) -> WatchHandle {
        self.shared.watchers.watch(
            pattern,
            timeout.unwrap_or(self.shared.settings.default_timeout),
            capture,
        )
    }

    /// Writes `line` and waits for the reply matching `pattern`.
    ///
    /// The watcher is registered before the write, so a reply that arrives
    /// before this future is next polled is still captured.
    pub async fn call(
        &self,
        line: impl Into<String>,
        pattern: &str,
        timeout: Option<Duration>,
        capture: Option<CaptureGroup>,
    ) -> WatchResult {
        let handle = self.watch(pattern, timeout, capture)?;
        self.write(line)?;
        handle.await
    }

    pub fn watchers(&self) -> &WatcherRegistry {
        &self.shared.watchers
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.shared.events.subscribe()
    }

    /// Publishes an application event to every subscriber of this link.
    pub fn publish(&self, topic: impl Into<String>, payload: Value) -> usize {
        self.shared.events.publish_domain(topic, payload)
    }

    pub fn stats(&self) -> &LinkStats {
        &self.shared.stats
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Moves the state machine to `to` if that is a legal single step.
    /// Returns false and changes nothing otherwise.
    pub(crate) fn transition(&self, to: ConnectionState) -> bool {
        let mut from = None;
        self.shared.state.send_if_modified(|current| {
            if current.can_transition_to(to) {
                from = Some(*current);
                *current = to;
                true
            } else {
                false
            }
        });
        match from {
            Some(from) => {
                info!(
                    "Session {}: state {} -> {}",
                    self.shared.session_id, from, to
                );
                self.shared
                    .events
                    .publish(LinkEvent::StateChanged { from, to });
                true
            }
            None => false,
        }
    }

    /// True while the transport is believed to be up.
    pub fn is_attached(&self) -> bool {
        *self.shared.attached.borrow()
    }

    /// Observes attachment; the value only ever goes from true to false.
    pub fn subscribe_attached(&self) -> watch::Receiver<bool> {
        self.shared.attached.subscribe()
    }

    /// Marks the transport as gone. Idempotent; the first call publishes
    /// `LinkEvent::TransportDetached`.
    pub fn detach(&self) {
        let was_attached = self.shared.attached.send_if_modified(|attached| {
            std::mem::replace(attached, false)
        });
        if was_attached {
            metrics::TRANSPORT_ATTACHED.set(0.0);
            self.shared.events.publish(LinkEvent::TransportDetached);
        }
    }
}
