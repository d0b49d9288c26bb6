//! WebSocket channel plumbing for the session pair.
//!
//! A connected channel is represented by a [`ChannelHandle`] backed by
//! two pump tasks: a writer draining an mpsc queue into the socket and
//! a reader forwarding incoming messages into the session's shared
//! event queue. The session layer never touches the socket directly,
//! and tests substitute an in-memory [`ChannelConnector`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::debug;

use crate::error::TapError;

// ── ChannelKind ──────────────────────────────────────────────────

/// Which of the two session channels an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Server → client frames, client → server stream control.
    Stream,
    /// Client → server input commands.
    Command,
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Command => write!(f, "command"),
        }
    }
}

// ── ChannelMessage ───────────────────────────────────────────────

/// One message crossing a channel, in either direction.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// JSON payload (control messages, input commands).
    Text(String),
    /// Binary payload (encoded frames).
    Binary(Bytes),
}

// ── ChannelEvent ─────────────────────────────────────────────────

/// Events surfaced to the session supervisor from the pump tasks.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A message arrived on the channel.
    Message(ChannelKind, ChannelMessage),
    /// The channel closed. `code` carries the WebSocket close code
    /// when the peer sent a close frame; `None` for transport errors
    /// and abrupt ends.
    Closed {
        kind: ChannelKind,
        code: Option<u16>,
    },
}

// ── ChannelHandle ────────────────────────────────────────────────

/// Sending side of a connected channel.
///
/// Dropping the handle closes the writer queue, which ends the writer
/// pump and in turn closes the socket.
#[derive(Debug, Clone)]
pub struct ChannelHandle {
    tx: mpsc::Sender<ChannelMessage>,
}

impl ChannelHandle {
    pub fn new(tx: mpsc::Sender<ChannelMessage>) -> Self {
        Self { tx }
    }

    /// Queue a message; fails once the channel is down.
    pub async fn send(&self, msg: ChannelMessage) -> Result<(), TapError> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| TapError::ChannelClosed)
    }

    /// Non-blocking variant for fire-and-forget callers; returns
    /// `false` when the message was not queued.
    pub fn try_send(&self, msg: ChannelMessage) -> bool {
        self.tx.try_send(msg).is_ok()
    }
}

// ── ChannelConnector ─────────────────────────────────────────────

/// Opens one channel of a session. The production implementation is
/// [`WsConnector`]; tests provide an in-memory fake.
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    /// Connect `kind` at `url`, spawning pump tasks that feed
    /// `events`. Resolves once the socket handshake completes.
    async fn connect(
        &self,
        kind: ChannelKind,
        url: &str,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Result<ChannelHandle, TapError>;
}

// ── WsConnector ──────────────────────────────────────────────────

/// Real WebSocket connector.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

const WRITE_QUEUE_DEPTH: usize = 64;

#[async_trait]
impl ChannelConnector for WsConnector {
    async fn connect(
        &self,
        kind: ChannelKind,
        url: &str,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Result<ChannelHandle, TapError> {
        let (ws, _response) = connect_async(url).await?;
        debug!(%kind, "channel open");

        let (mut writer, mut reader) = ws.split();
        let (out_tx, mut out_rx) = mpsc::channel::<ChannelMessage>(WRITE_QUEUE_DEPTH);

        // Writer pump: queue → socket. Ends when the handle drops or
        // the socket errors; sends a close frame on clean shutdown.
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let ws_msg = match msg {
                    ChannelMessage::Text(s) => WsMessage::Text(s),
                    ChannelMessage::Binary(b) => WsMessage::Binary(b.to_vec()),
                };
                if writer.send(ws_msg).await.is_err() {
                    break;
                }
            }
            let _ = writer.send(WsMessage::Close(None)).await;
        });

        // Reader pump: socket → session event queue. Always delivers
        // exactly one Closed event, carrying the peer's close code if
        // one was sent.
        tokio::spawn(async move {
            let mut close_code = None;
            loop {
                match reader.next().await {
                    Some(Ok(WsMessage::Binary(data))) => {
                        let msg = ChannelMessage::Binary(Bytes::from(data));
                        if events.send(ChannelEvent::Message(kind, msg)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(WsMessage::Text(text))) => {
                        let msg = ChannelMessage::Text(text);
                        if events.send(ChannelEvent::Message(kind, msg)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        close_code = frame.map(|f| u16::from(f.code));
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong handled by the library
                    Some(Err(e)) => {
                        debug!(%kind, "channel read error: {e}");
                        break;
                    }
                    None => break,
                }
            }
            let _ = events.send(ChannelEvent::Closed { kind, code: close_code }).await;
        });

        Ok(ChannelHandle::new(out_tx))
    }
}

// ── Tests ────────────────────────────────────────────────────────
