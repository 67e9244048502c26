//! Relay server lifecycle and per-connection handling.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::protocol::ClientMessage;
use crate::relay::{RelayConfig, RelayState};

/// The signaling relay server.
///
/// Constructed once by the process entry point via [`SignalingRelay::bind`]
/// and driven by [`SignalingRelay::run`] until its cancellation token fires.
/// All membership state lives in the injected [`RelayState`] and dies with
/// the server.
pub struct SignalingRelay {
    config: Arc<RelayConfig>,
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<RelayState>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl SignalingRelay {
    /// Binds the listener. Port 0 in the config picks an ephemeral port,
    /// reported by [`SignalingRelay::local_addr`].
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| RelayError::Bind {
                addr: config.listen,
                source,
            })?;
        let local_addr = listener.local_addr().map_err(RelayError::Accept)?;
        Ok(Self {
            config: Arc::new(config),
            listener,
            local_addr,
            state: Arc::new(RelayState::new()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Token that stops the accept loop when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// `ws://` URL clients should connect to. Mostly a test convenience.
    pub fn url(&self) -> String {
        format!("ws://{}{}", self.local_addr, self.config.path)
    }

    /// Accepts connections until shutdown, then drains connection tasks.
    pub async fn run(self) -> Result<(), RelayError> {
        info!(addr = %self.local_addr, path = %self.config.path, "signaling relay listening");
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, remote) = accepted.map_err(RelayError::Accept)?;
                    debug!(%remote, "accepted tcp connection");
                    let state = self.state.clone();
                    let config = self.config.clone();
                    let shutdown = self.shutdown.clone();
                    self.tracker.spawn(async move {
                        if let Err(e) = serve_connection(state, config, stream, shutdown).await {
                            debug!(%remote, "connection ended with error: {e}");
                        }
                    });
                }
                _ = self.shutdown.cancelled() => {
                    info!("relay shutting down, no longer accepting connections");
                    break;
                }
            }
        }
        self.tracker.close();
        self.tracker.wait().await;
        Ok(())
    }
}

/// Drives one participant connection: WebSocket handshake, message dispatch,
/// outbound fan-in, and membership cleanup on any exit path.
async fn serve_connection(
    state: Arc<RelayState>,
    config: Arc<RelayConfig>,
    stream: TcpStream,
    shutdown: CancellationToken,
) -> Result<(), RelayError> {
    let handshake_config = config.clone();
    let callback = move |req: &Request, resp: Response| {
        validate_handshake(&handshake_config, req).map(|()| resp)
    };
    let ws = tokio_tungstenite::accept_hdr_async(stream, callback).await?;
    let (mut sink, mut ws_rx) = ws.split();

    let participant_id = Uuid::new_v4().to_string();
    let (tx, mut outbound) = mpsc::unbounded_channel();
    state.register_peer(&participant_id, tx);
    debug!(participant = %participant_id, "participant connected");

    loop {
        tokio::select! {
            frame = ws_rx.next() => match frame {
                Some(Ok(Message::Text(txt))) => match serde_json::from_str::<ClientMessage>(&txt) {
                    Ok(msg) => state.handle_message(&participant_id, msg),
                    // Malformed frames are dropped; the connection stays up.
                    Err(e) => warn!(participant = %participant_id, "ignoring malformed frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // ping/pong/binary: nothing to dispatch
                Some(Err(e)) => {
                    debug!(participant = %participant_id, "transport error: {e}");
                    break;
                }
            },
            msg = outbound.recv() => match msg {
                Some(msg) => {
                    let txt = match serde_json::to_string(&msg) {
                        Ok(txt) => txt,
                        Err(e) => {
                            warn!(participant = %participant_id, "failed to encode message: {e}");
                            continue;
                        }
                    };
                    if sink.send(Message::text(txt)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
        }
    }

    state.handle_disconnect(&participant_id);
    debug!(participant = %participant_id, "participant disconnected");
    let _ = sink.close().await;
    Ok(())
}

/// Rejects handshakes for the wrong path or a disallowed `Origin`.
fn validate_handshake(config: &RelayConfig, req: &Request) -> Result<(), ErrorResponse> {
    if req.uri().path() != config.path {
        return Err(error_response(StatusCode::NOT_FOUND, "unknown path"));
    }
    if !config.allowed_origins.is_empty() {
        let origin = req
            .headers()
            .get("origin")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !config.allowed_origins.iter().any(|o| o == origin) {
            return Err(error_response(StatusCode::FORBIDDEN, "origin not allowed"));
        }
    }
    Ok(())
}

fn error_response(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some(reason.to_owned()));
    *resp.status_mut() = status;
    resp
}
