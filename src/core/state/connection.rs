// src/core/state/connection.rs

//! The states of the connection state machine.

use std::fmt;

/// Where a session is in its lifecycle.
///
/// `AwaitingLoginPrompt` -> `Authenticating` -> `Active` is the only forward
/// path. `Disconnected` and `Failed` are absorbing: once entered, nothing leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    AwaitingLoginPrompt,
    Authenticating,
    Active,
    Disconnected,
    Failed,
}

impl ConnectionState {
    /// Returns true for the absorbing states.
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Disconnected | ConnectionState::Failed)
    }

    /// Returns true if `to` is reachable from `self` in a single step.
    pub fn can_transition_to(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, to) {
            (Disconnected | Failed, _) => false,
            (_, Disconnected | Failed) => true,
            (AwaitingLoginPrompt, Authenticating) => true,
            (Authenticating, Active) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::AwaitingLoginPrompt => "awaiting_login_prompt",
            ConnectionState::Authenticating => "authenticating",
            ConnectionState::Active => "active",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
