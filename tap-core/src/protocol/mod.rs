//! Wire protocol for the two duplex channels.
//!
//! # Wire Protocol
//!
//! ## Stream channel (`/ws/screen`)
//! ```text
//! Client ──[StreamControl as JSON text]──────► Server
//! Server ──[binary frame payload]────────────► Client   (repeated)
//! ```
//! Query parameters on connect: `token`, `max_width`, `fps`, `quality`.
//!
//! ## Command channel (`/ws/input`)
//! ```text
//! Client ──[InputCommand as JSON text]───────► Server
//! ```
//! Query parameter on connect: `token`.
//!
//! Frames are opaque, self-describing image payloads (JPEG in
//! practice); the viewport decodes them without consulting any
//! per-frame metadata. There is no delivery guarantee — frames may be
//! dropped by either side under load.

mod input;
mod stream;

pub use input::{ClipboardAction, InputCommand, MouseButton};
pub use stream::{CLOSE_AUTH_REJECTED, StreamControl};

// ── ConnectOptions ───────────────────────────────────────────────

/// Parameters for one connection attempt, shared by both channels.
///
/// Reconnect attempts reuse the options of the original `connect`
/// call unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    /// WebSocket base URL, e.g. `wss://192.168.1.20:8443`.
    pub base_url: String,
    /// Bearer token, if the server has a password configured.
    pub token: Option<String>,
    /// Cap on streamed frame width in pixels; `None` = native.
    pub max_width: Option<u32>,
    /// Requested frames per second.
    pub fps: u8,
    /// Requested JPEG quality (1-100).
    pub quality: u8,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8443".into(),
            token: None,
            max_width: None,
            fps: 15,
            quality: 60,
        }
    }
}

impl ConnectOptions {
    /// Full URL for the stream channel, with stream parameters
    /// encoded as query parameters.
    ///
    /// Token values are JWTs (URL-safe base64), so no percent
    /// escaping is required.
    pub fn stream_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let mut url = format!(
            "{base}/ws/screen?fps={}&quality={}",
            self.fps, self.quality
        );
        if let Some(w) = self.max_width {
            url.push_str(&format!("&max_width={w}"));
        }
        if let Some(token) = &self.token {
            url.push_str(&format!("&token={token}"));
        }
        url
    }

    /// Full URL for the command channel.
    pub fn command_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.token {
            Some(token) => format!("{base}/ws/input?token={token}"),
            None => format!("{base}/ws/input"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
