//! Session lifecycle state machine and reconnect policy.
//!
//! Pure, synchronous state: the async [`SessionManager`] drives these
//! types and owns all I/O, so every lifecycle rule here is testable
//! without a transport or a clock.
//!
//! [`SessionManager`]: crate::session::SessionManager

use std::time::{Duration, Instant};

use crate::protocol::CLOSE_AUTH_REJECTED;

// ── SessionPhase ─────────────────────────────────────────────────

/// The current phase of the client session.
///
/// ```text
///  Disconnected ──► Connecting ──► Connected
///       ▲               │              │
///       └───────────────┴──────────────┘
///            (close / error / disconnect)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SessionPhase {
    /// No active channels. Initial / terminal state.
    #[default]
    Disconnected,

    /// Channel pair being opened (first attempt or retry).
    Connecting,

    /// Stream channel is open; frames and commands are flowing.
    Connected {
        /// When the session entered the `Connected` state.
        since: Instant,
    },
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected { .. } => write!(f, "Connected"),
        }
    }
}

impl SessionPhase {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

// ── ReconnectPolicy ──────────────────────────────────────────────

/// Exponential backoff schedule for reconnect attempts.
///
/// `delay(n) = min(base × factor ⁿ, max_delay)`.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Attempt ceiling; once the counter reaches it, no further
    /// retries are scheduled.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(1000),
            factor: 1.5,
            max_delay: Duration::from_millis(10_000),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Backoff delay before retry number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let ms = self.base_delay.as_secs_f64() * 1000.0 * self.factor.powi(attempt as i32);
        let capped = ms.min(self.max_delay.as_secs_f64() * 1000.0);
        Duration::from_secs_f64(capped / 1000.0)
    }
}

// ── RetryDecision ────────────────────────────────────────────────

/// What the session should do after a channel close or connect
/// failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Schedule another attempt after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// The server rejected the credentials; never retry.
    AuthRejected,
    /// The attempt ceiling was reached; surface a terminal failure.
    GiveUp,
}

// ── SessionState ─────────────────────────────────────────────────

/// Owned lifecycle state: phase plus the reconnect-attempt counter.
#[derive(Debug, Default)]
pub struct SessionState {
    phase: SessionPhase,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl SessionState {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            attempts: 0,
            policy,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// An explicit `connect()` call: enter `Connecting` and reset the
    /// attempt counter.
    pub fn begin_connect(&mut self) {
        self.phase = SessionPhase::Connecting;
        self.attempts = 0;
    }

    /// A scheduled retry re-enters `Connecting` without touching the
    /// counter.
    pub fn begin_retry(&mut self) {
        self.phase = SessionPhase::Connecting;
    }

    /// The stream channel opened: the session is live and the attempt
    /// counter starts over.
    pub fn on_stream_open(&mut self) {
        self.phase = SessionPhase::Connected {
            since: Instant::now(),
        };
        self.attempts = 0;
    }

    /// A channel closed (or an open failed). Always lands in
    /// `Disconnected`; the returned decision says whether a retry is
    /// scheduled.
    ///
    /// The reserved close code suppresses reconnection outright and
    /// burns the remaining attempt budget.
    pub fn on_closed(&mut self, close_code: Option<u16>) -> RetryDecision {
        self.phase = SessionPhase::Disconnected;

        if close_code == Some(CLOSE_AUTH_REJECTED) {
            self.attempts = self.policy.max_attempts;
            return RetryDecision::AuthRejected;
        }

        let attempt = self.attempts;
        self.attempts += 1;
        if self.attempts < self.policy.max_attempts {
            RetryDecision::Retry {
                attempt,
                delay: self.policy.delay(attempt),
            }
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Explicit disconnect: force the counter to the ceiling so any
    /// in-flight retry gives up, and land in `Disconnected`.
    pub fn force_disconnect(&mut self) {
        self.attempts = self.policy.max_attempts;
        self.phase = SessionPhase::Disconnected;
    }
}

// ── LatencyTracker ───────────────────────────────────────────────

/// Smoothed latency approximation derived from inter-frame arrival
/// spacing.
///
/// This is *not* a round-trip measurement: no ping/pong exchange is
/// performed. The spacing between consecutive frame arrivals is fed
/// into an exponential moving average (weight 0.3 on the new sample,
/// 0.7 on the prior estimate), which tracks how fresh the stream is.
#[derive(Debug, Default)]
pub struct LatencyTracker {
    last_arrival: Option<Instant>,
    estimate_ms: Option<f64>,
}

const EMA_WEIGHT: f64 = 0.3;

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame arrival; returns the updated estimate once two
    /// arrivals have been seen.
    pub fn on_frame(&mut self, now: Instant) -> Option<f64> {
        if let Some(prev) = self.last_arrival {
            let sample = now.duration_since(prev).as_secs_f64() * 1000.0;
            self.estimate_ms = Some(match self.estimate_ms {
                None => sample,
                Some(prior) => EMA_WEIGHT * sample + (1.0 - EMA_WEIGHT) * prior,
            });
        }
        self.last_arrival = Some(now);
        self.estimate_ms
    }

    /// Current estimate in milliseconds, if any.
    pub fn estimate_ms(&self) -> Option<f64> {
        self.estimate_ms
    }

    /// Forget history across reconnects.
    pub fn reset(&mut self) {
        self.last_arrival = None;
        self.estimate_ms = None;
    }
}

// ── Tests ────────────────────────────────────────────────────────
