//! Wire messages exchanged with the signaling relay.
//!
//! Every frame is a JSON text message with an `{"event": ..., "data": ...}`
//! envelope. The relay dispatches on the event name only; offer/answer/
//! candidate bodies stay opaque `serde_json::Value`s and are forwarded
//! unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages a participant sends to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Declare membership in a room. The room id is the sole capability.
    #[serde(rename_all = "camelCase")]
    JoinRoom { room_id: String },
    /// SDP offer, relayed verbatim to the other room members.
    #[serde(rename_all = "camelCase")]
    Offer { room_id: String, offer: Value },
    /// SDP answer, same relay semantics as `Offer`.
    #[serde(rename_all = "camelCase")]
    Answer { room_id: String, answer: Value },
    /// Trickled ICE candidate, same relay semantics as `Offer`.
    #[serde(rename_all = "camelCase")]
    IceCandidate { room_id: String, candidate: Value },
}

/// Messages the relay sends to a participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Post-join member count, delivered to the joiner only.
    #[serde(rename_all = "camelCase")]
    RoomInfo { user_count: usize },
    /// A new participant joined; delivered to pre-existing members only.
    #[serde(rename_all = "camelCase")]
    UserJoined { participant_id: String },
    #[serde(rename_all = "camelCase")]
    Offer { room_id: String, offer: Value },
    #[serde(rename_all = "camelCase")]
    Answer { room_id: String, answer: Value },
    #[serde(rename_all = "camelCase")]
    IceCandidate { room_id: String, candidate: Value },
    /// A participant's transport dropped; delivered to its room members.
    #[serde(rename_all = "camelCase")]
    UserDisconnected { participant_id: String },
}
