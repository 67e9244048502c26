//! Shared types for the negotiation session.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use webrtc::ice_transport::ice_candidate::RTCIceCandidateInit;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::track::track_remote::TrackRemote;

/// Trickled ICE candidate as it travels through the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u16>,
}

impl IceCandidate {
    pub(crate) fn from_init(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_mline_index,
        }
    }

    pub(crate) fn into_init(self) -> RTCIceCandidateInit {
        RTCIceCandidateInit {
            candidate: self.candidate,
            sdp_mid: self.sdp_mid,
            sdp_mline_index: self.sdp_mline_index,
            username_fragment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceServerKind {
    Stun,
    Turn,
}

/// STUN/TURN server entry supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub kind: IceServerKind,
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            kind: IceServerKind::Stun,
            url: url.into(),
            username: None,
            credential: None,
        }
    }

    pub fn turn(
        url: impl Into<String>,
        username: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            kind: IceServerKind::Turn,
            url: url.into(),
            username: Some(username.into()),
            credential: Some(credential.into()),
        }
    }

    /// URL with the `stun:`/`turn:` scheme prepended when missing.
    fn normalized_url(&self) -> String {
        if self.url.starts_with("stun:") || self.url.starts_with("turn:") {
            return self.url.clone();
        }
        let scheme = match self.kind {
            IceServerKind::Stun => "stun:",
            IceServerKind::Turn => "turn:",
        };
        format!("{}{}", scheme, self.url)
    }

    pub(crate) fn to_rtc(&self) -> RTCIceServer {
        RTCIceServer {
            urls: vec![self.normalized_url()],
            username: self.username.clone().unwrap_or_default(),
            credential: self.credential.clone().unwrap_or_default(),
        }
    }
}

/// Public Google STUN pair, used when the caller configures nothing.
pub fn default_ice_servers() -> Vec<IceServerConfig> {
    vec![
        IceServerConfig::stun("stun:stun.l.google.com:19302"),
        IceServerConfig::stun("stun:stun1.l.google.com:19302"),
    ]
}

/// Display-only role label derived from the post-join member count; first
/// into the room is the interviewer. Never used for negotiation correctness.
pub fn role_for_user_count(user_count: usize) -> &'static str {
    if user_count <= 1 {
        "Interviewer"
    } else {
        "Candidate"
    }
}

/// What the session reports back to its owner (the UI layer, in the original
/// design) over an unbounded channel.
#[derive(Clone)]
pub enum SessionEvent {
    /// Post-join member count, reported once per `join-room`.
    RoomInfo { user_count: usize },
    /// A remote participant entered the room; this side will offer.
    PeerJoined { participant_id: String },
    SignalingState(RTCSignalingState),
    ConnectionState(RTCPeerConnectionState),
    /// A remote media track arrived. The session owns the remote track set
    /// and replaces it wholesale on renegotiation.
    RemoteTrack(Arc<TrackRemote>),
    /// The remote participant's transport dropped; the session is idle again.
    PeerLeft { participant_id: String },
    /// Terminal: the session tore down and released its resources.
    Closed,
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomInfo { user_count } => f
                .debug_struct("RoomInfo")
                .field("user_count", user_count)
                .finish(),
            Self::PeerJoined { participant_id } => f
                .debug_struct("PeerJoined")
                .field("participant_id", participant_id)
                .finish(),
            Self::SignalingState(s) => f.debug_tuple("SignalingState").field(s).finish(),
            Self::ConnectionState(s) => f.debug_tuple("ConnectionState").field(s).finish(),
            Self::RemoteTrack(t) => f.debug_tuple("RemoteTrack").field(&t.id()).finish(),
            Self::PeerLeft { participant_id } => f
                .debug_struct("PeerLeft")
                .field("participant_id", participant_id)
                .finish(),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

/// Internal feedback from peer-connection callbacks into the session loop.
pub(crate) enum Command {
    LocalCandidate(IceCandidate),
    RemoteTrack(Arc<TrackRemote>),
    RestartIce,
}
