//! Peer connection construction and callback wiring.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::RTCPeerConnection;

use crate::peer::media::LocalMedia;
use crate::peer::types::{Command, IceCandidate, IceServerConfig, SessionEvent};

/// Builds a peer connection with every local track attached and its
/// callbacks routed into the session loop.
///
/// Callbacks never touch session state directly: local candidates, remote
/// tracks and restart requests go through the command channel so the session
/// loop stays the single writer.
pub(crate) async fn build_peer(
    media: &LocalMedia,
    ice_servers: &[IceServerConfig],
    commands: UnboundedSender<Command>,
    events: UnboundedSender<SessionEvent>,
) -> Result<Arc<RTCPeerConnection>, webrtc::Error> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;
    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let config = RTCConfiguration {
        ice_servers: ice_servers.iter().map(IceServerConfig::to_rtc).collect(),
        ..Default::default()
    };
    let pc = Arc::new(api.new_peer_connection(config).await?);

    for track in media.tracks() {
        pc.add_track(track.clone()).await?;
    }

    let cand_tx = commands.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        let cand_tx = cand_tx.clone();
        Box::pin(async move {
            // None marks the end of gathering
            let Some(c) = cand else { return };
            match c.to_json() {
                Ok(init) => {
                    let _ = cand_tx.send(Command::LocalCandidate(IceCandidate::from_init(init)));
                }
                Err(e) => warn!("failed to serialize local candidate: {e}"),
            }
        })
    }));

    let track_tx = commands.clone();
    pc.on_track(Box::new(move |track, _receiver, _transceiver| {
        debug!(track = %track.id(), "remote track arrived");
        let _ = track_tx.send(Command::RemoteTrack(track));
        Box::pin(async {})
    }));

    // Transient connectivity loss recovers in place via an ICE restart
    // instead of tearing the negotiated session down.
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        if matches!(
            state,
            RTCIceConnectionState::Failed | RTCIceConnectionState::Disconnected
        ) {
            debug!(?state, "ice connectivity lost, requesting restart");
            let _ = commands.send(Command::RestartIce);
        }
        Box::pin(async {})
    }));

    let signaling_events = events.clone();
    pc.on_signaling_state_change(Box::new(move |state| {
        let _ = signaling_events.send(SessionEvent::SignalingState(state));
        Box::pin(async {})
    }));

    pc.on_peer_connection_state_change(Box::new(move |state| {
        let _ = events.send(SessionEvent::ConnectionState(state));
        Box::pin(async {})
    }));

    Ok(pc)
}
