// src/core/events.rs

//! Defines the event bus owned by a link. Collaborators that care about session
//! lifecycle or about each other's domain events subscribe here instead of
//! reaching for process-wide signals.

use crate::core::state::ConnectionState;
use serde_json::Value;
use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;

/// The capacity of the broadcast channel. Slow subscribers that fall further
/// behind than this observe a `Lagged` error and skip ahead.
const EVENT_BUS_CAPACITY: usize = 1024;

/// An event broadcast to every subscriber of a link's bus.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The connection state machine moved from one state to another.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    /// The transport has gone away. Timers that pause when disconnected stop
    /// writing from this point on.
    TransportDetached,
    /// An application-defined event, published by one collaborator for others.
    Domain { topic: String, payload: Value },
}

/// The `EventBus` fans link events out to any number of subscribers.
#[derive(Debug)]
pub struct EventBus {
    sender: Sender<LinkEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    /// Publishes an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: LinkEvent) -> usize {
        match self.sender.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                debug!("Published {event:?} with no active subscribers.");
                0
            }
        }
    }

    /// Convenience wrapper for publishing a `LinkEvent::Domain`.
    pub fn publish_domain(&self, topic: impl Into<String>, payload: Value) -> usize {
        self.publish(LinkEvent::Domain {
            topic: topic.into(),
            payload,
        })
    }

    pub fn subscribe(&self) -> Receiver<LinkEvent> {
        self.sender.subscribe()
    }
}
