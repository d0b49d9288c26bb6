//! Session management for the two-channel remote desktop connection.
//!
//! A session is a pair of WebSocket channels against one server:
//!
//! ```text
//!             ┌────────────────────── session ─────────────────────┐
//!  client ◄───┤ stream   /ws/screen   binary frames + JSON control │
//!  client ────┤ command  /ws/input    JSON input commands          │
//!             └────────────────────────────────────────────────────┘
//! ```
//!
//! The channels share one lifecycle: when either closes, the session
//! tears both down and (unless the close was an authentication
//! rejection or the attempt budget is spent) schedules a reconnect
//! with exponential backoff. The command channel is opened first so
//! the session never reports frames it cannot act on.

pub mod channel;
pub mod state;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::TapError;
use crate::protocol::{ConnectOptions, InputCommand, StreamControl};

pub use channel::{ChannelConnector, ChannelEvent, ChannelHandle, ChannelKind, ChannelMessage, WsConnector};
pub use state::{LatencyTracker, ReconnectPolicy, RetryDecision, SessionPhase, SessionState};

// ── SessionEvent ─────────────────────────────────────────────────

/// Notifications delivered to the application event loop.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A connection attempt is starting. `attempt` is 0 for the first
    /// try after an explicit connect, then counts retries.
    Connecting { attempt: u32 },

    /// Both channels are open.
    Connected,

    /// One encoded frame arrived on the stream channel.
    Frame(Bytes),

    /// A JSON payload arrived on the command channel (clipboard
    /// content and similar replies).
    CommandText(String),

    /// Updated latency estimate, milliseconds.
    Latency(f64),

    /// The session went down. `retry_in` is the scheduled backoff
    /// delay, or `None` when no retry will follow.
    Disconnected { retry_in: Option<Duration> },

    /// The server rejected the credentials. Terminal; the token must
    /// be re-acquired before connecting again.
    AuthRejected,

    /// The reconnect budget is exhausted. Terminal until the next
    /// explicit connect.
    GaveUp,
}

// ── SessionManager ───────────────────────────────────────────────

struct Handles {
    stream: ChannelHandle,
    command: ChannelHandle,
}

struct Inner {
    options: ConnectOptions,
    connector: Arc<dyn ChannelConnector>,
    state: Mutex<SessionState>,
    handles: Mutex<Option<Handles>>,
    phase_tx: watch::Sender<SessionPhase>,
    events: mpsc::Sender<SessionEvent>,
    cancel: Mutex<CancellationToken>,
}

/// Owns the channel pair and its reconnect lifecycle.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
    phase_rx: watch::Receiver<SessionPhase>,
}

const EVENT_QUEUE_DEPTH: usize = 256;

/// Activity bookkeeping cadence while connected.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(3);

impl SessionManager {
    /// Build a manager and the event receiver the application drains.
    pub fn new(
        options: ConnectOptions,
        connector: Arc<dyn ChannelConnector>,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        Self::with_policy(options, connector, ReconnectPolicy::default())
    }

    pub fn with_policy(
        options: ConnectOptions,
        connector: Arc<dyn ChannelConnector>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Disconnected);
        let inner = Arc::new(Inner {
            options,
            connector,
            state: Mutex::new(SessionState::new(policy)),
            handles: Mutex::new(None),
            phase_tx,
            events: event_tx,
            cancel: Mutex::new(CancellationToken::new()),
        });
        (
            Self {
                inner,
                phase_rx,
            },
            event_rx,
        )
    }

    /// Current session phase.
    pub fn phase(&self) -> SessionPhase {
        *self.phase_rx.borrow()
    }

    /// Watch receiver for phase transitions.
    pub fn phase_receiver(&self) -> watch::Receiver<SessionPhase> {
        self.phase_rx.clone()
    }

    /// Start the session supervisor. Ignored if the session is
    /// already connecting or connected.
    pub fn connect(&self) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if !state.phase().is_disconnected() {
                debug!("connect ignored, session already {}", state.phase());
                return;
            }
            state.begin_connect();
        }

        let token = CancellationToken::new();
        *self.inner.cancel.lock().unwrap() = token.clone();

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            supervise(inner, token).await;
        });
    }

    /// Tear the session down and suppress any pending retry.
    /// Idempotent.
    pub fn disconnect(&self) {
        self.inner.state.lock().unwrap().force_disconnect();
        self.inner.cancel.lock().unwrap().cancel();
        *self.inner.handles.lock().unwrap() = None;
    }

    /// Fire-and-forget send on the command channel. Returns `false`
    /// when the session is down or the queue is full; the command is
    /// dropped, never buffered for later.
    pub fn send_command(&self, cmd: &InputCommand) -> bool {
        let Ok(json) = serde_json::to_string(cmd) else {
            return false;
        };
        self.try_send(|h| &h.command, json)
    }

    /// Fire-and-forget send on the stream channel.
    pub fn send_stream_control(&self, ctl: &StreamControl) -> bool {
        let Ok(json) = serde_json::to_string(ctl) else {
            return false;
        };
        self.try_send(|h| &h.stream, json)
    }

    fn try_send(&self, pick: impl Fn(&Handles) -> &ChannelHandle, json: String) -> bool {
        let handles = self.inner.handles.lock().unwrap();
        match handles.as_ref() {
            Some(h) => pick(h).try_send(ChannelMessage::Text(json)),
            None => false,
        }
    }
}

// ── Supervisor ───────────────────────────────────────────────────

async fn supervise(inner: Arc<Inner>, token: CancellationToken) {
    loop {
        if token.is_cancelled() {
            break;
        }

        let attempt = inner.state.lock().unwrap().attempts();
        let _ = inner
            .events
            .send(SessionEvent::Connecting { attempt })
            .await;
        let _ = inner.phase_tx.send(SessionPhase::Connecting);

        let close_code = run_attempt(&inner, &token).await;
        *inner.handles.lock().unwrap() = None;

        if token.is_cancelled() {
            break;
        }

        let decision = inner.state.lock().unwrap().on_closed(close_code);
        match decision {
            RetryDecision::Retry { attempt, delay } => {
                info!(attempt, ?delay, "session down, retrying");
                let _ = inner
                    .events
                    .send(SessionEvent::Disconnected {
                        retry_in: Some(delay),
                    })
                    .await;
                let _ = inner.phase_tx.send(SessionPhase::Disconnected);

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
                inner.state.lock().unwrap().begin_retry();
            }
            RetryDecision::AuthRejected => {
                warn!("server rejected credentials, not retrying");
                let _ = inner.phase_tx.send(SessionPhase::Disconnected);
                let _ = inner
                    .events
                    .send(SessionEvent::Disconnected { retry_in: None })
                    .await;
                let _ = inner.events.send(SessionEvent::AuthRejected).await;
                break;
            }
            RetryDecision::GiveUp => {
                warn!("reconnect budget exhausted, giving up");
                let _ = inner.phase_tx.send(SessionPhase::Disconnected);
                let _ = inner
                    .events
                    .send(SessionEvent::Disconnected { retry_in: None })
                    .await;
                let _ = inner.events.send(SessionEvent::GaveUp).await;
                break;
            }
        }
    }

    let _ = inner.phase_tx.send(SessionPhase::Disconnected);
}

/// Run one connect-and-pump attempt. Returns the close code that
/// ended it, if the peer sent one.
async fn run_attempt(inner: &Arc<Inner>, token: &CancellationToken) -> Option<u16> {
    let (chan_tx, mut chan_rx) = mpsc::channel::<ChannelEvent>(EVENT_QUEUE_DEPTH);

    // Command channel first: a session that can see but not act is
    // worse than one that fails fast.
    let command_url = inner.options.command_url();
    let command = tokio::select! {
        _ = token.cancelled() => return None,
        r = inner.connector.connect(
            ChannelKind::Command,
            &command_url,
            chan_tx.clone(),
        ) => match r {
            Ok(h) => h,
            Err(e) => {
                debug!("command channel connect failed: {e}");
                return close_code_of(&e);
            }
        },
    };

    let stream_url = inner.options.stream_url();
    let stream = tokio::select! {
        _ = token.cancelled() => return None,
        r = inner.connector.connect(
            ChannelKind::Stream,
            &stream_url,
            chan_tx.clone(),
        ) => match r {
            Ok(h) => h,
            Err(e) => {
                debug!("stream channel connect failed: {e}");
                // Dropping `command` closes it.
                return close_code_of(&e);
            }
        },
    };

    *inner.handles.lock().unwrap() = Some(Handles { stream, command });
    inner.state.lock().unwrap().on_stream_open();
    let _ = inner.phase_tx.send(SessionPhase::Connected {
        since: Instant::now(),
    });
    let _ = inner.events.send(SessionEvent::Connected).await;
    info!("session connected");

    let mut latency = LatencyTracker::new();
    let mut last_activity = Instant::now();

    // Periodic bookkeeping only; no ping/pong is exchanged.
    let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            biased;
            _ = token.cancelled() => return None,
            _ = keepalive.tick() => {
                trace!(
                    idle_ms = last_activity.elapsed().as_millis() as u64,
                    "session keep-alive check"
                );
                continue;
            }
            ev = chan_rx.recv() => match ev {
                Some(ev) => ev,
                None => return None,
            },
        };
        last_activity = Instant::now();

        match event {
            ChannelEvent::Message(ChannelKind::Stream, ChannelMessage::Binary(bytes)) => {
                if let Some(est) = latency.on_frame(Instant::now()) {
                    let _ = inner.events.send(SessionEvent::Latency(est)).await;
                }
                let _ = inner.events.send(SessionEvent::Frame(bytes)).await;
            }
            ChannelEvent::Message(ChannelKind::Command, ChannelMessage::Text(text)) => {
                let _ = inner.events.send(SessionEvent::CommandText(text)).await;
            }
            ChannelEvent::Message(kind, msg) => {
                debug!(%kind, "unexpected message on channel: {msg:?}");
            }
            ChannelEvent::Closed { kind, code } => {
                debug!(%kind, ?code, "channel closed");
                return code;
            }
        }
    }
}

fn close_code_of(_e: &TapError) -> Option<u16> {
    // Handshake failures carry no close code; the state machine
    // treats them as abnormal closures.
    None
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CLOSE_AUTH_REJECTED;
    use async_trait::async_trait;

    /// In-memory connector: records opened URLs and exposes the
    /// event sender of the latest attempt so tests can inject
    /// traffic and closes.
    struct FakeConnector {
        fail: Mutex<bool>,
        opened: Mutex<Vec<(ChannelKind, String)>>,
        taps: Mutex<Vec<mpsc::Sender<ChannelEvent>>>,
        queues: Mutex<Vec<mpsc::Receiver<ChannelMessage>>>,
    }

    impl FakeConnector {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail: Mutex::new(false),
                opened: Mutex::new(Vec::new()),
                taps: Mutex::new(Vec::new()),
                queues: Mutex::new(Vec::new()),
            })
        }

        fn set_fail(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn opened(&self) -> Vec<(ChannelKind, String)> {
            self.opened.lock().unwrap().clone()
        }

        fn latest_tap(&self) -> mpsc::Sender<ChannelEvent> {
            self.taps.lock().unwrap().last().unwrap().clone()
        }

        /// Take the write queue of the i-th opened channel.
        fn take_queue(&self, i: usize) -> mpsc::Receiver<ChannelMessage> {
            self.queues.lock().unwrap().remove(i)
        }
    }

    #[async_trait]
    impl ChannelConnector for FakeConnector {
        async fn connect(
            &self,
            kind: ChannelKind,
            url: &str,
            events: mpsc::Sender<ChannelEvent>,
        ) -> Result<ChannelHandle, TapError> {
            if *self.fail.lock().unwrap() {
                return Err(TapError::Other("connection refused".into()));
            }
            self.opened.lock().unwrap().push((kind, url.to_string()));
            self.taps.lock().unwrap().push(events);
            let (tx, rx) = mpsc::channel(16);
            self.queues.lock().unwrap().push(rx);
            Ok(ChannelHandle::new(tx))
        }
    }

    fn options() -> ConnectOptions {
        ConnectOptions {
            token: Some("tok".into()),
            ..ConnectOptions::default()
        }
    }

    async fn wait_for(rx: &mut mpsc::Receiver<SessionEvent>, want: SessionEvent) {
        loop {
            let ev = rx.recv().await.unwrap();
            if ev == want {
                return;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn opens_command_channel_before_stream() {
        let connector = FakeConnector::new();
        let (session, mut rx) = SessionManager::new(options(), connector.clone());

        session.connect();
        wait_for(&mut rx, SessionEvent::Connected).await;

        let opened = connector.opened();
        assert_eq!(opened.len(), 2);
        assert_eq!(opened[0].0, ChannelKind::Command);
        assert!(opened[0].1.contains("/ws/input?token=tok"));
        assert_eq!(opened[1].0, ChannelKind::Stream);
        assert!(opened[1].1.contains("/ws/screen?"));
        assert!(opened[1].1.contains("token=tok"));
        assert!(session.phase().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_frames_and_command_replies() {
        let connector = FakeConnector::new();
        let (session, mut rx) = SessionManager::new(options(), connector.clone());
        session.connect();
        wait_for(&mut rx, SessionEvent::Connected).await;

        let tap = connector.latest_tap();
        tap.send(ChannelEvent::Message(
            ChannelKind::Stream,
            ChannelMessage::Binary(Bytes::from_static(b"jpeg")),
        ))
        .await
        .unwrap();
        wait_for(&mut rx, SessionEvent::Frame(Bytes::from_static(b"jpeg"))).await;

        tap.send(ChannelEvent::Message(
            ChannelKind::Command,
            ChannelMessage::Text("{\"clipboard\":\"hi\"}".into()),
        ))
        .await
        .unwrap();
        wait_for(
            &mut rx,
            SessionEvent::CommandText("{\"clipboard\":\"hi\"}".into()),
        )
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_with_backoff_then_gives_up() {
        let connector = FakeConnector::new();
        connector.set_fail(true);
        let (session, mut rx) = SessionManager::new(options(), connector.clone());

        let started = tokio::time::Instant::now();
        session.connect();

        // Ten failed attempts, nine backoff sleeps in between.
        for attempt in 0..10u32 {
            wait_for(&mut rx, SessionEvent::Connecting { attempt }).await;
        }
        wait_for(&mut rx, SessionEvent::GaveUp).await;

        // 1000 + 1500 + 2250 + 3375 + 5062.5 + 7593.75 + 3×10000 ms.
        let elapsed = started.elapsed();
        assert_eq!(elapsed, Duration::from_secs_f64(50.78125));
        assert!(session.phase().is_disconnected());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_connect_resets_backoff() {
        let connector = FakeConnector::new();
        connector.set_fail(true);
        let (session, mut rx) = SessionManager::new(options(), connector.clone());
        session.connect();

        // Fail a few times, then let it through.
        wait_for(&mut rx, SessionEvent::Connecting { attempt: 2 }).await;
        connector.set_fail(false);
        wait_for(&mut rx, SessionEvent::Connected).await;

        // A later closure starts the schedule from the base delay.
        connector
            .latest_tap()
            .send(ChannelEvent::Closed {
                kind: ChannelKind::Stream,
                code: None,
            })
            .await
            .unwrap();
        loop {
            match rx.recv().await.unwrap() {
                SessionEvent::Disconnected { retry_in } => {
                    assert_eq!(retry_in, Some(Duration::from_millis(1000)));
                    break;
                }
                _ => {}
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn auth_rejection_close_is_terminal() {
        let connector = FakeConnector::new();
        let (session, mut rx) = SessionManager::new(options(), connector.clone());
        session.connect();
        wait_for(&mut rx, SessionEvent::Connected).await;

        connector
            .latest_tap()
            .send(ChannelEvent::Closed {
                kind: ChannelKind::Command,
                code: Some(CLOSE_AUTH_REJECTED),
            })
            .await
            .unwrap();

        wait_for(&mut rx, SessionEvent::AuthRejected).await;
        assert!(session.phase().is_disconnected());

        // No further attempts were made.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.opened().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_suppresses_pending_retry() {
        let connector = FakeConnector::new();
        connector.set_fail(true);
        let (session, mut rx) = SessionManager::new(options(), connector.clone());
        session.connect();
        wait_for(&mut rx, SessionEvent::Connecting { attempt: 1 }).await;

        session.disconnect();
        session.disconnect(); // idempotent

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(session.phase().is_disconnected());
        assert!(!session.send_command(&InputCommand::move_relative(1.0, 1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn commands_are_dropped_while_down() {
        let connector = FakeConnector::new();
        let (session, mut rx) = SessionManager::new(options(), connector.clone());
        assert!(!session.send_command(&InputCommand::move_relative(1.0, 0.0)));

        session.connect();
        wait_for(&mut rx, SessionEvent::Connected).await;
        assert!(session.send_command(&InputCommand::move_relative(1.0, 0.0)));
        assert!(session.send_stream_control(&StreamControl::SetQuality { quality: 70 }));

        // The serialized commands land on the right channels
        // (channel 0 = command, 1 = stream, in open order).
        let mut command_q = connector.take_queue(0);
        match command_q.recv().await.unwrap() {
            ChannelMessage::Text(json) => assert!(json.contains("mouse_move")),
            other => panic!("expected text, got {other:?}"),
        }
        let mut stream_q = connector.take_queue(0);
        match stream_q.recv().await.unwrap() {
            ChannelMessage::Text(json) => assert!(json.contains("set_quality")),
            other => panic!("expected text, got {other:?}"),
        }
    }
}
