// src/connection/mod.rs

//! Drives a single session over an established transport: login, activation
//! and the inbound dispatch loop.

mod guard;
mod handler;
mod session;

pub use guard::TransportGuard;
pub use handler::ConnectionHandler;
pub use session::{AuthMarkers, SessionSettings};
