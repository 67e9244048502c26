//! The negotiation session: one peer connection driven over the relay.
//!
//! The session is a single event loop. Relay messages, locally gathered
//! candidates and restart requests all arrive as events; nothing blocks
//! waiting for a reply, and several candidate events may be in flight while
//! an answer is still pending. Negotiation errors are absorbed where they
//! occur — the loop logs them and waits for the next event.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use webrtc::peer_connection::offer_answer_options::RTCOfferOptions;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_remote::TrackRemote;

use crate::client::{RelayClient, RelayReceiver, RelaySender};
use crate::error::SessionError;
use crate::peer::connection::build_peer;
use crate::peer::media::LocalMedia;
use crate::peer::types::{default_ice_servers, Command, IceCandidate, IceServerConfig, SessionEvent};
use crate::protocol::{ClientMessage, ServerMessage};

/// Where and what to join.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Full relay endpoint, e.g. `ws://127.0.0.1:4000/signal`.
    pub relay_url: String,
    /// Room capability token. Anyone holding it may join.
    pub room_id: String,
    /// STUN/TURN servers; empty means the default public STUN pair.
    pub ice_servers: Vec<IceServerConfig>,
}

impl SessionConfig {
    pub fn new(relay_url: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            room_id: room_id.into(),
            ice_servers: Vec::new(),
        }
    }
}

/// Cancels the session loop from outside; [`PeerSession::run`] then tears
/// everything down before returning.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    shutdown: CancellationToken,
}

impl SessionHandle {
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

/// A connected, joined participant. Drive it with [`PeerSession::run`].
pub struct PeerSession {
    sender: RelaySender,
    receiver: RelayReceiver,
    cmd_rx: UnboundedReceiver<Command>,
    negotiator: Negotiator,
    shutdown: CancellationToken,
}

impl PeerSession {
    /// Opens the relay connection and declares room membership. Transport
    /// failures here surface to the caller; there is no automatic retry.
    pub async fn connect(
        config: SessionConfig,
        media: LocalMedia,
        events: UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let client = RelayClient::connect(&config.relay_url).await?;
        let (mut sender, receiver) = client.into_split();
        sender
            .send(&ClientMessage::JoinRoom {
                room_id: config.room_id.clone(),
            })
            .await?;

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        Ok(Self {
            sender,
            receiver,
            cmd_rx,
            negotiator: Negotiator::new(config, media, events, cmd_tx),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Runs until the relay closes the connection or the handle cancels the
    /// session. Teardown happens on every exit path: the peer connection is
    /// closed, the relay transport shut, and a final `Closed` event emitted.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let mut result = Ok(());
        loop {
            tokio::select! {
                msg = self.receiver.next() => match msg {
                    Ok(Some(msg)) => {
                        self.negotiator
                            .handle_server_message(&mut self.sender, msg)
                            .await;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        result = Err(e);
                        break;
                    }
                },
                Some(cmd) = self.cmd_rx.recv() => {
                    self.negotiator.handle_command(&mut self.sender, cmd).await;
                }
                _ = self.shutdown.cancelled() => break,
            }
        }
        self.negotiator.teardown().await;
        let _ = self.sender.close().await;
        result
    }
}

/// Per-remote-peer negotiation state. Owned by the session loop, mutated
/// nowhere else.
struct Negotiator {
    room_id: String,
    ice_servers: Vec<IceServerConfig>,
    media: LocalMedia,
    events: UnboundedSender<SessionEvent>,
    cmd_tx: UnboundedSender<Command>,
    pc: Option<Arc<RTCPeerConnection>>,
    /// Remote candidates that arrived before the remote description.
    pending_remote: Vec<IceCandidate>,
    remote_tracks: Vec<Arc<TrackRemote>>,
}

impl Negotiator {
    fn new(
        config: SessionConfig,
        media: LocalMedia,
        events: UnboundedSender<SessionEvent>,
        cmd_tx: UnboundedSender<Command>,
    ) -> Self {
        let ice_servers = if config.ice_servers.is_empty() {
            default_ice_servers()
        } else {
            config.ice_servers
        };
        Self {
            room_id: config.room_id,
            ice_servers,
            media,
            events,
            cmd_tx,
            pc: None,
            pending_remote: Vec::new(),
            remote_tracks: Vec::new(),
        }
    }

    async fn handle_server_message(&mut self, out: &mut RelaySender, msg: ServerMessage) {
        match msg {
            ServerMessage::RoomInfo { user_count } => {
                let _ = self.events.send(SessionEvent::RoomInfo { user_count });
            }
            ServerMessage::UserJoined { participant_id } => {
                // Pre-existing member: this side makes the offer.
                let _ = self.events.send(SessionEvent::PeerJoined {
                    participant_id: participant_id.clone(),
                });
                if let Err(e) = self.send_offer(out, false).await {
                    warn!(peer = %participant_id, "failed to start negotiation: {e}");
                }
            }
            ServerMessage::Offer { offer, .. } => {
                if let Err(e) = self.answer_offer(out, offer).await {
                    warn!("failed to answer offer: {e}");
                }
            }
            ServerMessage::Answer { answer, .. } => self.apply_answer(answer).await,
            ServerMessage::IceCandidate { candidate, .. } => {
                self.apply_remote_candidate(candidate).await;
            }
            ServerMessage::UserDisconnected { participant_id } => {
                self.peer_left(participant_id).await;
            }
        }
    }

    async fn handle_command(&mut self, out: &mut RelaySender, cmd: Command) {
        match cmd {
            Command::LocalCandidate(cand) => {
                if self.active_peer().is_none() {
                    return;
                }
                match serde_json::to_value(&cand) {
                    Ok(candidate) => {
                        let msg = ClientMessage::IceCandidate {
                            room_id: self.room_id.clone(),
                            candidate,
                        };
                        if let Err(e) = out.send(&msg).await {
                            warn!("failed to relay local candidate: {e}");
                        }
                    }
                    Err(e) => warn!("failed to encode local candidate: {e}"),
                }
            }
            Command::RemoteTrack(track) => {
                let _ = self.events.send(SessionEvent::RemoteTrack(track.clone()));
                self.remote_tracks.push(track);
            }
            Command::RestartIce => {
                if let Err(e) = self.send_offer(out, true).await {
                    warn!("ice restart failed: {e}");
                }
            }
        }
    }

    /// Creates (or restarts) an offer on the current connection and relays
    /// it. `ice_restart` keeps the negotiated session while renewing
    /// connectivity after a transient network change.
    async fn send_offer(&mut self, out: &mut RelaySender, ice_restart: bool) -> Result<(), SessionError> {
        let pc = self.ensure_peer().await?;
        let options = ice_restart.then(|| RTCOfferOptions {
            ice_restart: true,
            ..Default::default()
        });
        let offer = pc.create_offer(options).await?;
        pc.set_local_description(offer).await?;
        let Some(local) = pc.local_description().await else {
            return Ok(());
        };
        let offer = serde_json::to_value(&local).map_err(SessionError::Encode)?;
        out.send(&ClientMessage::Offer {
            room_id: self.room_id.clone(),
            offer,
        })
        .await
    }

    async fn answer_offer(&mut self, out: &mut RelaySender, offer: Value) -> Result<(), SessionError> {
        let desc: RTCSessionDescription = match serde_json::from_value(offer) {
            Ok(desc) => desc,
            Err(e) => {
                warn!("discarding malformed offer: {e}");
                return Ok(());
            }
        };
        let pc = self.ensure_peer().await?;
        if let Err(e) = pc.set_remote_description(desc).await {
            warn!("rejecting offer: {e}");
            return Ok(());
        }
        self.flush_pending(&pc).await;
        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer).await?;
        let Some(local) = pc.local_description().await else {
            return Ok(());
        };
        let answer = serde_json::to_value(&local).map_err(SessionError::Encode)?;
        out.send(&ClientMessage::Answer {
            room_id: self.room_id.clone(),
            answer,
        })
        .await
    }

    async fn apply_answer(&mut self, answer: Value) {
        // Stale or duplicate answers for a torn-down connection are dropped.
        let Some(pc) = self.active_peer() else {
            debug!("ignoring answer: no active connection");
            return;
        };
        let desc: RTCSessionDescription = match serde_json::from_value(answer) {
            Ok(desc) => desc,
            Err(e) => {
                warn!("discarding malformed answer: {e}");
                return;
            }
        };
        if let Err(e) = pc.set_remote_description(desc).await {
            warn!("failed to apply answer: {e}");
            return;
        }
        self.flush_pending(&pc).await;
    }

    async fn apply_remote_candidate(&mut self, candidate: Value) {
        let cand: IceCandidate = match serde_json::from_value(candidate) {
            Ok(cand) => cand,
            Err(e) => {
                warn!("discarding malformed candidate: {e}");
                return;
            }
        };
        match &self.pc {
            Some(pc) if pc.signaling_state() == RTCSignalingState::Closed => {
                debug!("ignoring candidate for closed connection");
            }
            Some(pc) if pc.remote_description().await.is_some() => {
                if let Err(e) = pc.add_ice_candidate(cand.into_init()).await {
                    warn!("failed to add remote candidate: {e}");
                }
            }
            // No remote description yet: buffer until the offer/answer
            // carrying it has been applied.
            _ => self.pending_remote.push(cand),
        }
    }

    async fn flush_pending(&mut self, pc: &Arc<RTCPeerConnection>) {
        for cand in self.pending_remote.drain(..) {
            if let Err(e) = pc.add_ice_candidate(cand.into_init()).await {
                warn!("failed to apply buffered candidate: {e}");
            }
        }
    }

    /// The remote side's transport dropped: discard the connection and the
    /// remote tracks, back to idle. The closed connection stays in place so
    /// stale messages for it keep hitting the closed checks.
    async fn peer_left(&mut self, participant_id: String) {
        if let Some(pc) = self.pc.as_ref() {
            if let Err(e) = pc.close().await {
                debug!("error closing peer connection: {e}");
            }
        }
        self.pending_remote.clear();
        self.remote_tracks.clear();
        let _ = self.events.send(SessionEvent::PeerLeft { participant_id });
    }

    async fn teardown(&mut self) {
        if let Some(pc) = self.pc.take() {
            if let Err(e) = pc.close().await {
                debug!("error closing peer connection during teardown: {e}");
            }
        }
        self.pending_remote.clear();
        self.remote_tracks.clear();
        let _ = self.events.send(SessionEvent::Closed);
    }

    /// Reuses the live connection or replaces a closed/absent one, exactly
    /// like the reference client recreating its connection on demand.
    async fn ensure_peer(&mut self) -> Result<Arc<RTCPeerConnection>, SessionError> {
        if let Some(pc) = self.active_peer() {
            return Ok(pc);
        }
        self.remote_tracks.clear();
        let pc = build_peer(
            &self.media,
            &self.ice_servers,
            self.cmd_tx.clone(),
            self.events.clone(),
        )
        .await?;
        self.pc = Some(pc.clone());
        Ok(pc)
    }

    fn active_peer(&self) -> Option<Arc<RTCPeerConnection>> {
        self.pc
            .as_ref()
            .filter(|pc| pc.signaling_state() != RTCSignalingState::Closed)
            .cloned()
    }
}
