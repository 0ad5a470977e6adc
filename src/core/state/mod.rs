// src/core/state/mod.rs

//! Session-scoped state shared between the connection handler and the link.

mod connection;
mod stats;

pub use connection::ConnectionState;
pub use stats::LinkStats;
