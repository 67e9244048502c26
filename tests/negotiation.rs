//! End-to-end negotiation tests: full sessions talking through an
//! in-process relay. Connectivity itself needs real network paths, so the
//! assertions stop at the signaling layer reaching `stable` on both sides.

use std::sync::Arc;
use std::time::Duration;

use roomlink::error::SessionError;
use roomlink::peer::LocalMedia;
use roomlink::{
    ClientMessage, PeerSession, RelayClient, RelayConfig, ServerMessage, SessionConfig,
    SessionEvent, SignalingRelay,
};
use serde_json::json;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

const WAIT: Duration = Duration::from_secs(10);

async fn start_relay() -> String {
    let config = RelayConfig {
        listen: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let relay = SignalingRelay::bind(config).await.expect("bind relay");
    let url = relay.url();
    tokio::spawn(relay.run());
    url
}

fn test_media(label: &str) -> LocalMedia {
    let track: Arc<dyn TrackLocal + Send + Sync> = Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            ..Default::default()
        },
        "audio".to_owned(),
        label.to_owned(),
    ));
    LocalMedia::new(vec![track]).expect("non-empty media")
}

/// Waits for the first event matching `pred`, skipping everything else
/// (state changes and track events interleave freely).
async fn expect_event(
    rx: &mut UnboundedReceiver<SessionEvent>,
    what: &str,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Some(ev) if pred(&ev) => return ev,
                Some(_) => {}
                None => panic!("event channel closed while waiting for {what}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

#[tokio::test]
async fn two_sessions_negotiate_to_stable() {
    let url = start_relay().await;

    let (a_tx, mut a_rx) = mpsc::unbounded_channel();
    let a = PeerSession::connect(SessionConfig::new(&url, "main"), test_media("a"), a_tx)
        .await
        .expect("connect a");
    let a_handle = a.handle();
    let a_task = tokio::spawn(a.run());
    expect_event(&mut a_rx, "room-info for a", |e| {
        matches!(e, SessionEvent::RoomInfo { user_count: 1 })
    })
    .await;

    let (b_tx, mut b_rx) = mpsc::unbounded_channel();
    let b = PeerSession::connect(SessionConfig::new(&url, "main"), test_media("b"), b_tx)
        .await
        .expect("connect b");
    let b_handle = b.handle();
    let b_task = tokio::spawn(b.run());
    expect_event(&mut b_rx, "room-info for b", |e| {
        matches!(e, SessionEvent::RoomInfo { user_count: 2 })
    })
    .await;

    // The pre-existing member learns about the joiner and offers.
    expect_event(&mut a_rx, "peer-joined on a", |e| {
        matches!(e, SessionEvent::PeerJoined { .. })
    })
    .await;

    // Offer/answer completes without any media actually flowing.
    expect_event(&mut a_rx, "stable on a", |e| {
        matches!(e, SessionEvent::SignalingState(RTCSignalingState::Stable))
    })
    .await;
    expect_event(&mut b_rx, "stable on b", |e| {
        matches!(e, SessionEvent::SignalingState(RTCSignalingState::Stable))
    })
    .await;

    // B leaves; A is told and returns to idle without erroring.
    b_handle.close();
    assert!(b_task.await.expect("join b task").is_ok());
    expect_event(&mut b_rx, "closed on b", |e| {
        matches!(e, SessionEvent::Closed)
    })
    .await;
    expect_event(&mut a_rx, "peer-left on a", |e| {
        matches!(e, SessionEvent::PeerLeft { .. })
    })
    .await;

    a_handle.close();
    assert!(a_task.await.expect("join a task").is_ok());
    expect_event(&mut a_rx, "closed on a", |e| {
        matches!(e, SessionEvent::Closed)
    })
    .await;
}

#[tokio::test]
async fn session_survives_malformed_negotiation() {
    let url = start_relay().await;

    let (a_tx, mut a_rx) = mpsc::unbounded_channel();
    let a = PeerSession::connect(SessionConfig::new(&url, "main"), test_media("a"), a_tx)
        .await
        .expect("connect a");
    let a_handle = a.handle();
    let a_task = tokio::spawn(a.run());
    expect_event(&mut a_rx, "room-info", |e| {
        matches!(e, SessionEvent::RoomInfo { user_count: 1 })
    })
    .await;

    let mut raw = RelayClient::connect(&url).await.unwrap();

    // An answer from outside the room, before any negotiation exists, is
    // dropped without disturbing the session.
    raw.send(&ClientMessage::Answer {
        room_id: "main".into(),
        answer: json!({"type": "answer", "sdp": "v=0\r\n"}),
    })
    .await
    .unwrap();

    raw.send(&ClientMessage::JoinRoom {
        room_id: "main".into(),
    })
    .await
    .unwrap();
    expect_event(&mut a_rx, "peer-joined", |e| {
        matches!(e, SessionEvent::PeerJoined { .. })
    })
    .await;

    // A offers to the newcomer; candidates may arrive interleaved.
    let offer = timeout(WAIT, async {
        loop {
            match raw.next().await.unwrap() {
                Some(ServerMessage::Offer { offer, .. }) => return offer,
                Some(_) => {}
                None => panic!("relay closed before the offer arrived"),
            }
        }
    })
    .await
    .expect("timed out waiting for the offer");
    assert_eq!(offer["type"], "offer");

    // Garbage replies: one that fails to decode, one that decodes but is
    // not valid SDP, and a candidate with the wrong shape.
    raw.send(&ClientMessage::Answer {
        room_id: "main".into(),
        answer: json!({"type": "answer", "sdp": 42}),
    })
    .await
    .unwrap();
    raw.send(&ClientMessage::Answer {
        room_id: "main".into(),
        answer: json!({"type": "answer", "sdp": "definitely not sdp"}),
    })
    .await
    .unwrap();
    raw.send(&ClientMessage::IceCandidate {
        room_id: "main".into(),
        candidate: json!({"candidate": 5}),
    })
    .await
    .unwrap();

    raw.close().await.unwrap();
    drop(raw);

    // The session absorbed all of it and reports the departure.
    expect_event(&mut a_rx, "peer-left", |e| {
        matches!(e, SessionEvent::PeerLeft { .. })
    })
    .await;

    a_handle.close();
    assert!(a_task.await.expect("join a task").is_ok());
    expect_event(&mut a_rx, "closed", |e| matches!(e, SessionEvent::Closed)).await;
}

#[tokio::test]
async fn empty_local_media_is_rejected() {
    match LocalMedia::new(Vec::new()) {
        Err(SessionError::NoLocalMedia) => {}
        other => panic!("expected NoLocalMedia, got {other:?}"),
    }
}
