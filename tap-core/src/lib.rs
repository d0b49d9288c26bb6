//! # tap-core
//!
//! Client core for touch-driven remote desktop control over LAN.
//!
//! This crate contains:
//! - **Protocol types**: `ConnectOptions`, `InputCommand`, `StreamControl` — the
//!   wire vocabulary of the two WebSocket channels
//! - **Session**: `SessionManager` owning the stream/command channel pair, with
//!   exponential-backoff reconnection and auth-failure suppression
//! - **Viewport**: `FrameViewport` decoding binary frames with drop-based
//!   backpressure, and the virtual-camera `Camera` for zoom/pan and
//!   viewport-to-remote coordinate mapping
//! - **Gesture**: `GestureRecognizer` classifying multi-touch input into remote
//!   input commands, plus the reduced `PointerInput` mouse path
//! - **Auth**: `AuthClient` for the password/token exchange and the read-only
//!   system endpoints
//! - **Error**: `TapError` — typed, `thiserror`-based error hierarchy

pub mod auth;
pub mod error;
pub mod gesture;
pub mod protocol;
pub mod session;
pub mod viewport;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use auth::{AuthClient, AuthError, AuthStatus, MonitorInfo, SystemInfo, TokenStore};
pub use error::TapError;
pub use gesture::{GestureEvent, GestureRecognizer, Haptic, InputMode, PointerInput};
pub use protocol::{
    CLOSE_AUTH_REJECTED, ClipboardAction, ConnectOptions, InputCommand, MouseButton, StreamControl,
};
pub use session::{
    ChannelConnector, ReconnectPolicy, SessionEvent, SessionManager, SessionPhase, WsConnector,
};
pub use viewport::{Camera, DecodedFrame, FrameViewport, SharedCamera, ViewportStats};
