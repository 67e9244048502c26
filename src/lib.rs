//! roomlink: peer-to-peer session signaling and room coordination.
//!
//! Two halves, joined by a JSON-over-WebSocket protocol:
//!
//! - a signaling relay (`relay`, shipped as the `roomlink-relay` binary)
//!   that tracks room membership and forwards offer/answer/candidate
//!   messages verbatim between the members of a room, and
//! - a client-side negotiation session (`peer`) that drives a WebRTC
//!   connection through offer/answer/ICE exchange, ICE-restart recovery and
//!   teardown.
//!
//! Media itself flows peer-to-peer outside this crate; the relay only ever
//! sees opaque negotiation payloads.

pub mod client;
pub mod error;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod relay;

pub use client::RelayClient;
pub use error::{RelayError, SessionError};
pub use peer::{LocalMedia, PeerSession, SessionConfig, SessionEvent, SessionHandle};
pub use protocol::{ClientMessage, ServerMessage};
pub use registry::RoomRegistry;
pub use relay::{RelayConfig, SignalingRelay};
