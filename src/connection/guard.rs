// src/connection/guard.rs

//! Defines `TransportGuard`, an RAII guard that marks the link as disconnected
//! however the connection handler's loop ends.

use crate::core::link::Link;
use crate::core::state::ConnectionState;
use tracing::debug;

pub struct TransportGuard {
    link: Link,
}

impl TransportGuard {
    pub(crate) fn new(link: Link) -> Self {
        Self { link }
    }
}

impl Drop for TransportGuard {
    /// Moves a still-live state machine to `Disconnected` and detaches the
    /// transport, so timers that pause when disconnected stop writing.
    fn drop(&mut self) {
        if !self.link.state().is_terminal() {
            self.link.transition(ConnectionState::Disconnected);
        }
        debug!(
            "TransportGuard dropping, detaching session {}",
            self.link.session_id()
        );
        self.link.detach();
    }
}
