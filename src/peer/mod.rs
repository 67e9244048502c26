//! Client-side peer negotiation: the state machine that turns relay
//! messages into a live WebRTC connection.

pub mod connection;
pub mod media;
pub mod session;
pub mod types;

pub use media::LocalMedia;
pub use session::{PeerSession, SessionConfig, SessionHandle};
pub use types::{
    default_ice_servers, role_for_user_count, IceCandidate, IceServerConfig, IceServerKind,
    SessionEvent,
};
