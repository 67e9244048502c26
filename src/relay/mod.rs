//! Signaling relay: accepts WebSocket connections from participants,
//! tracks room membership and forwards negotiation messages between the
//! members of a room.

pub mod server;
pub mod state;

pub use server::SignalingRelay;
pub use state::RelayState;

use std::net::SocketAddr;

/// Relay listener configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to listen on. Port 0 binds an ephemeral port.
    pub listen: SocketAddr,
    /// Base path the WebSocket handshake must request.
    pub path: String,
    /// `Origin` values accepted during the handshake. Empty list allows any
    /// origin (development default, mirroring a permissive CORS fallback).
    pub allowed_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: ([127, 0, 0, 1], 4000).into(),
            path: "/signal".to_owned(),
            allowed_origins: Vec::new(),
        }
    }
}
