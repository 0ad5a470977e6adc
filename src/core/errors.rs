// src/core/errors.rs

//! Defines the primary error type for the line-protocol core.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// The main error enum, representing every failure the core can surface.
/// Only `AuthenticationFailed` and `TransportLost` are fatal to a session; the
/// rest are recovered by whoever receives them.
#[derive(Error, Debug)]
pub enum MudlinkError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    /// A watcher's deadline passed without any inbound line matching it.
    #[error("No match found for pattern '{pattern}' within {timeout:?}")]
    WatcherTimeout { pattern: String, timeout: Duration },

    /// The session ended while a watcher was still outstanding.
    #[error("Watcher for pattern '{0}' was dropped before it resolved")]
    WatcherDropped(String),

    /// The watcher matched, but the requested capture group did not participate.
    #[error("Capture group '{0}' did not participate in the match")]
    CaptureGroupMissing(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A keyword/value segment inside a command line could not be parsed.
    #[error("Malformed command segment '{0}'")]
    MalformedCommandSegment(String),

    /// A syntactically valid command line named a token with no handler.
    #[error("Unknown command token '{0}'")]
    UnknownCommandToken(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Transport lost: {0}")]
    TransportLost(String),

    #[error("Inbound line exceeds the maximum length of {0} bytes")]
    LineTooLong(usize),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl MudlinkError {
    /// Returns true for the errors that end the whole session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MudlinkError::AuthenticationFailed(_)
                | MudlinkError::TransportLost(_)
                | MudlinkError::Io(_)
                | MudlinkError::LineTooLong(_)
        )
    }
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// A resolved watcher hands the same error to whoever awaits it.
impl Clone for MudlinkError {
    fn clone(&self) -> Self {
        match self {
            MudlinkError::Io(e) => MudlinkError::Io(Arc::clone(e)),
            MudlinkError::WatcherTimeout { pattern, timeout } => MudlinkError::WatcherTimeout {
                pattern: pattern.clone(),
                timeout: *timeout,
            },
            MudlinkError::WatcherDropped(s) => MudlinkError::WatcherDropped(s.clone()),
            MudlinkError::CaptureGroupMissing(s) => MudlinkError::CaptureGroupMissing(s.clone()),
            MudlinkError::InvalidPattern(s) => MudlinkError::InvalidPattern(s.clone()),
            MudlinkError::MalformedCommandSegment(s) => {
                MudlinkError::MalformedCommandSegment(s.clone())
            }
            MudlinkError::UnknownCommandToken(s) => MudlinkError::UnknownCommandToken(s.clone()),
            MudlinkError::AuthenticationFailed(s) => MudlinkError::AuthenticationFailed(s.clone()),
            MudlinkError::TransportLost(s) => MudlinkError::TransportLost(s.clone()),
            MudlinkError::LineTooLong(n) => MudlinkError::LineTooLong(*n),
            MudlinkError::InvalidSchedule(s) => MudlinkError::InvalidSchedule(s.clone()),
            MudlinkError::Handler(s) => MudlinkError::Handler(s.clone()),
            MudlinkError::Internal(s) => MudlinkError::Internal(s.clone()),
        }
    }
}

impl PartialEq for MudlinkError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MudlinkError::Io(e1), MudlinkError::Io(e2)) => e1.to_string() == e2.to_string(),
            (
                MudlinkError::WatcherTimeout {
                    pattern: p1,
                    timeout: t1,
                },
                MudlinkError::WatcherTimeout {
                    pattern: p2,
                    timeout: t2,
                },
            ) => p1 == p2 && t1 == t2,
            (MudlinkError::WatcherDropped(s1), MudlinkError::WatcherDropped(s2)) => s1 == s2,
            (MudlinkError::CaptureGroupMissing(s1), MudlinkError::CaptureGroupMissing(s2)) => {
                s1 == s2
            }
            (MudlinkError::InvalidPattern(s1), MudlinkError::InvalidPattern(s2)) => s1 == s2,
            (
                MudlinkError::MalformedCommandSegment(s1),
                MudlinkError::MalformedCommandSegment(s2),
            ) => s1 == s2,
            (MudlinkError::UnknownCommandToken(s1), MudlinkError::UnknownCommandToken(s2)) => {
                s1 == s2
            }
            (MudlinkError::AuthenticationFailed(s1), MudlinkError::AuthenticationFailed(s2)) => {
                s1 == s2
            }
            (MudlinkError::TransportLost(s1), MudlinkError::TransportLost(s2)) => s1 == s2,
            (MudlinkError::LineTooLong(n1), MudlinkError::LineTooLong(n2)) => n1 == n2,
            (MudlinkError::InvalidSchedule(s1), MudlinkError::InvalidSchedule(s2)) => s1 == s2,
            (MudlinkError::Handler(s1), MudlinkError::Handler(s2)) => s1 == s2,
            (MudlinkError::Internal(s1), MudlinkError::Internal(s2)) => s1 == s2,
            _ => false,
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for MudlinkError {
    fn from(e: std::io::Error) -> Self {
        MudlinkError::Io(Arc::new(e))
    }
}

impl From<regex::Error> for MudlinkError {
    fn from(e: regex::Error) -> Self {
        MudlinkError::InvalidPattern(e.to_string())
    }
}

impl From<anyhow::Error> for MudlinkError {
    fn from(e: anyhow::Error) -> Self {
        MudlinkError::Handler(format!("{e:#}"))
    }
}

impl From<serde_json::Error> for MudlinkError {
    fn from(e: serde_json::Error) -> Self {
        MudlinkError::Internal(format!("JSON serialization/deserialization error: {e}"))
    }
}
