//! Typed WebSocket client for the signaling relay.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::warn;

use crate::error::SessionError;
use crate::protocol::{ClientMessage, ServerMessage};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outbound half of a relay connection.
pub struct RelaySender {
    sink: SplitSink<WsStream, Message>,
}

impl RelaySender {
    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), SessionError> {
        let txt = serde_json::to_string(msg).map_err(SessionError::Encode)?;
        self.sink.send(Message::text(txt)).await?;
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Inbound half of a relay connection.
pub struct RelayReceiver {
    stream: SplitStream<WsStream>,
}

impl RelayReceiver {
    /// Next server message. `Ok(None)` means the relay closed the
    /// connection. Malformed and non-text frames are skipped, matching the
    /// relay's own tolerance for them.
    pub async fn next(&mut self) -> Result<Option<ServerMessage>, SessionError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(txt))) => match serde_json::from_str(&txt) {
                    Ok(msg) => return Ok(Some(msg)),
                    Err(e) => warn!("ignoring malformed relay frame: {e}"),
                },
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

/// A connected relay client. The negotiation session splits it so the read
/// loop and outbound sends can interleave; tests mostly use it whole.
pub struct RelayClient {
    tx: RelaySender,
    rx: RelayReceiver,
}

impl RelayClient {
    /// Connects to `url` (a full `ws://host:port/path` endpoint).
    pub async fn connect(url: &str) -> Result<Self, SessionError> {
        let (ws, _resp) = connect_async(url).await?;
        let (sink, stream) = ws.split();
        Ok(Self {
            tx: RelaySender { sink },
            rx: RelayReceiver { stream },
        })
    }

    pub async fn send(&mut self, msg: &ClientMessage) -> Result<(), SessionError> {
        self.tx.send(msg).await
    }

    pub async fn next(&mut self) -> Result<Option<ServerMessage>, SessionError> {
        self.rx.next().await
    }

    pub async fn close(&mut self) -> Result<(), SessionError> {
        self.tx.close().await
    }

    pub fn into_split(self) -> (RelaySender, RelayReceiver) {
        (self.tx, self.rx)
    }
}
