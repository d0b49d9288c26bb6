//! Domain-specific error types for the tap client core.
//!
//! All fallible operations return `Result<T, TapError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the tap client core.
#[derive(Debug, Error)]
pub enum TapError {
    // ── Transport Errors ─────────────────────────────────────────
    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The underlying I/O layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    /// An internal channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// A server URL could not be parsed into channel endpoints.
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    // ── Frame Errors ─────────────────────────────────────────────
    /// A received frame payload could not be decoded as an image.
    #[error("frame decode failed: {0}")]
    Decode(String),

    // ── Serialization Errors ─────────────────────────────────────
    /// Encoding or decoding of a wire message failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Auth Errors ──────────────────────────────────────────────
    /// The auth service rejected or failed a request.
    #[error(transparent)]
    Auth(#[from] crate::auth::AuthError),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for TapError {
    fn from(s: String) -> Self {
        TapError::Other(s)
    }
}

impl From<&str> for TapError {
    fn from(s: &str) -> Self {
        TapError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for TapError {
    fn from(e: serde_json::Error) -> Self {
        TapError::Encoding(e.to_string())
    }
}

impl From<image::ImageError> for TapError {
    fn from(e: image::ImageError) -> Self {
        TapError::Decode(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let e = TapError::InvalidUrl("not-a-url".into());
        assert!(e.to_string().contains("not-a-url"));

        let e = TapError::Decode("truncated jpeg".into());
        assert!(e.to_string().contains("decode"));
    }

    #[test]
    fn from_string() {
        let e: TapError = "something broke".into();
        assert!(matches!(e, TapError::Other(_)));
    }

    #[test]
    fn from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let e: TapError = io_err.into();
        assert!(matches!(e, TapError::Io(_)));
    }
}
