//! Error taxonomy: transport errors surface to the caller, negotiation
//! errors are absorbed where they occur, resource errors block session
//! startup.

use std::net::SocketAddr;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Relay-side failures. Per-message problems (malformed frames, slow peers)
/// are logged and dropped, never raised through here.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tungstenite::Error),
}

/// Client-session failures.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The relay connection failed or dropped mid-session. Recovery is a
    /// fresh connect + join; nothing is retried automatically.
    #[error("relay transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("failed to encode relay message: {0}")]
    Encode(#[source] serde_json::Error),
    /// Peer connection construction failed. Negotiation errors after that
    /// point are absorbed by the session loop instead.
    #[error("peer connection setup failed: {0}")]
    Negotiation(#[from] webrtc::Error),
    /// No local media tracks: fatal to starting a session, the caller must
    /// not enter the negotiation flow.
    #[error("no local media tracks available")]
    NoLocalMedia,
}
