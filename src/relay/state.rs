//! Shared relay state: the room registry plus the outbound channel of every
//! connected participant.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::registry::RoomRegistry;

/// One relay process owns exactly one `RelayState`, created at server start
/// and dropped at shutdown. Mutation happens only inside the relay's own
/// connection handlers; the mutexes guard nothing longer than a map update
/// plus non-blocking channel sends.
#[derive(Debug, Default)]
pub struct RelayState {
    registry: Mutex<RoomRegistry>,
    peers: Mutex<HashMap<String, UnboundedSender<ServerMessage>>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a freshly accepted participant's outbound channel.
    pub fn register_peer(&self, participant: &str, tx: UnboundedSender<ServerMessage>) {
        self.peers
            .lock()
            .expect("relay peer map poisoned")
            .insert(participant.to_owned(), tx);
    }

    /// Dispatches one inbound message from `participant`.
    pub fn handle_message(&self, participant: &str, msg: ClientMessage) {
        match msg {
            ClientMessage::JoinRoom { room_id } => self.handle_join(participant, &room_id),
            ClientMessage::Offer { room_id, offer } => self.forward(
                participant,
                &room_id.clone(),
                ServerMessage::Offer { room_id, offer },
            ),
            ClientMessage::Answer { room_id, answer } => self.forward(
                participant,
                &room_id.clone(),
                ServerMessage::Answer { room_id, answer },
            ),
            ClientMessage::IceCandidate { room_id, candidate } => self.forward(
                participant,
                &room_id.clone(),
                ServerMessage::IceCandidate { room_id, candidate },
            ),
        }
    }

    /// Transport disconnect: removes the participant everywhere and notifies
    /// the members of the rooms it was in.
    ///
    /// The reference behavior broadcast `user-disconnected` to every client
    /// server-wide; that was a scoping bug, so the notification is scoped to
    /// the affected rooms here.
    pub fn handle_disconnect(&self, participant: &str) {
        let affected = {
            let mut registry = self.registry.lock().expect("room registry poisoned");
            registry.leave_all(participant)
        };
        self.peers
            .lock()
            .expect("relay peer map poisoned")
            .remove(participant);

        for room in affected {
            debug!(participant, room, "participant left room on disconnect");
            self.forward(
                participant,
                &room,
                ServerMessage::UserDisconnected {
                    participant_id: participant.to_owned(),
                },
            );
        }
    }

    fn handle_join(&self, participant: &str, room: &str) {
        let (newly_joined, user_count) = {
            let mut registry = self.registry.lock().expect("room registry poisoned");
            let newly_joined = registry.join(room, participant);
            (newly_joined, registry.count(room))
        };
        debug!(participant, room, user_count, "join-room");

        // Post-join count goes to the joiner only.
        self.send_to(participant, ServerMessage::RoomInfo { user_count });

        // Pre-existing members learn about the joiner; the joiner never
        // receives its own user-joined, and a duplicate join announces
        // nothing.
        if newly_joined {
            self.forward(
                participant,
                room,
                ServerMessage::UserJoined {
                    participant_id: participant.to_owned(),
                },
            );
        }
    }

    /// Sends `msg` to every member of `room` except `sender`.
    fn forward(&self, sender: &str, room: &str, msg: ServerMessage) {
        let members = {
            let registry = self.registry.lock().expect("room registry poisoned");
            registry.members(room)
        };
        for member in members {
            if member != sender {
                self.send_to(&member, msg.clone());
            }
        }
    }

    fn send_to(&self, participant: &str, msg: ServerMessage) {
        let peers = self.peers.lock().expect("relay peer map poisoned");
        if let Some(tx) = peers.get(participant) {
            // Best-effort: a closed channel means the peer is tearing down.
            if tx.send(msg).is_err() {
                debug!(participant, "dropping message for disconnecting peer");
            }
        }
    }
}
