//! Control messages sent on the stream channel.

use serde::{Deserialize, Serialize};

/// Reserved WebSocket close code the server uses to signal an
/// authentication rejection. A close with this code must never be
/// followed by an automatic reconnect.
pub const CLOSE_AUTH_REJECTED: u16 = 4001;

// ── StreamControl ────────────────────────────────────────────────

/// Client → server adjustments to the live stream.
///
/// Applied by the server to the running capture; takes effect from
/// the next frame. No acknowledgement is sent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamControl {
    /// Change JPEG quality (1-100).
    SetQuality { quality: u8 },
    /// Change the target frame rate.
    SetFps { fps: u8 },
    /// Switch the captured monitor (0 = combined/all).
    SetMonitor { monitor: u8 },
}

// ── Tests ────────────────────────────────────────────────────────
