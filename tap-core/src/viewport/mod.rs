//! Frame-streaming viewport.
//!
//! Consumes binary frames from the stream channel, decodes them off
//! the event loop, and publishes the latest decoded frame via a
//! `tokio::sync::watch` channel so a renderer can always read the
//! freshest frame without blocking the receive path.
//!
//! Backpressure is drop-based: while one decode is in flight, any
//! frame that arrives is discarded, never queued. Combined with
//! last-applied-wins publication this keeps the view current under
//! load instead of falling progressively behind.

pub mod camera;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;
use tracing::trace;

pub use camera::{Camera, MAX_SCALE, MIN_SCALE, Rect, SharedCamera};

// ── DecodedFrame ─────────────────────────────────────────────────

/// One decoded remote-screen image, RGBA8.
#[derive(Debug, Clone, Default)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major RGBA.
    pub pixels: Vec<u8>,
}

// ── ViewportStats ────────────────────────────────────────────────

/// Throughput statistics exposed to the UI.
#[derive(Debug, Clone, Default)]
pub struct ViewportStats {
    /// Frames decoded within the last second.
    pub fps: f64,
    /// Total frames decoded since start.
    pub total_frames: u64,
    /// Frames discarded because a decode was still in flight.
    pub dropped_frames: u64,
    /// Frames discarded because the payload failed to decode.
    pub decode_failures: u64,
    /// Last frame width.
    pub width: u32,
    /// Last frame height.
    pub height: u32,
}

struct StatsInner {
    window: VecDeque<Instant>,
    stats: ViewportStats,
}

// ── FrameViewport ────────────────────────────────────────────────

/// Consumes and decodes binary frames, applying the shared camera's
/// transform state for rendering and coordinate mapping.
pub struct FrameViewport {
    camera: SharedCamera,
    decode_busy: Arc<AtomicBool>,
    frame_tx: watch::Sender<Option<DecodedFrame>>,
    frame_rx: watch::Receiver<Option<DecodedFrame>>,
    stats_tx: watch::Sender<ViewportStats>,
    stats_rx: watch::Receiver<ViewportStats>,
    inner: Arc<Mutex<StatsInner>>,
}

impl FrameViewport {
    /// Create a viewport sharing `camera` with the gesture layer.
    pub fn new(camera: SharedCamera) -> Self {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (stats_tx, stats_rx) = watch::channel(ViewportStats::default());
        Self {
            camera,
            decode_busy: Arc::new(AtomicBool::new(false)),
            frame_tx,
            frame_rx,
            stats_tx,
            stats_rx,
            inner: Arc::new(Mutex::new(StatsInner {
                window: VecDeque::with_capacity(64),
                stats: ViewportStats::default(),
            })),
        }
    }

    /// Obtain a receiver that yields the latest decoded frame.
    pub fn frame_receiver(&self) -> watch::Receiver<Option<DecodedFrame>> {
        self.frame_rx.clone()
    }

    /// Obtain a receiver for throughput statistics.
    pub fn stats_receiver(&self) -> watch::Receiver<ViewportStats> {
        self.stats_rx.clone()
    }

    /// The shared camera handle.
    pub fn camera(&self) -> SharedCamera {
        Arc::clone(&self.camera)
    }

    /// Handle to the decode-in-flight flag.
    pub fn decode_busy_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.decode_busy)
    }

    /// Feed one binary frame payload from the stream channel.
    ///
    /// Returns `false` when the frame was dropped because a previous
    /// decode is still outstanding. Decode errors are silent: the
    /// failure counter is bumped and the viewport waits for the next
    /// frame.
    ///
    /// Must be called from within a tokio runtime (decode runs on the
    /// blocking pool).
    pub fn apply_frame(&self, bytes: Bytes) -> bool {
        if self.decode_busy.swap(true, Ordering::AcqRel) {
            let mut inner = self.inner.lock().unwrap();
            inner.stats.dropped_frames += 1;
            let _ = self.stats_tx.send(inner.stats.clone());
            trace!(dropped = inner.stats.dropped_frames, "frame dropped, decode in flight");
            return false;
        }

        let busy = Arc::clone(&self.decode_busy);
        let camera = Arc::clone(&self.camera);
        let inner = Arc::clone(&self.inner);
        let frame_tx = self.frame_tx.clone();
        let stats_tx = self.stats_tx.clone();

        tokio::spawn(async move {
            let decoded =
                tokio::task::spawn_blocking(move || image::load_from_memory(&bytes)).await;

            match decoded {
                Ok(Ok(img)) => {
                    let rgba = img.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    camera
                        .lock()
                        .unwrap()
                        .set_image_size(width as f64, height as f64);

                    let _ = frame_tx.send(Some(DecodedFrame {
                        width,
                        height,
                        pixels: rgba.into_raw(),
                    }));

                    let mut inner = inner.lock().unwrap();
                    let now = Instant::now();
                    inner.window.push_back(now);
                    while inner
                        .window
                        .front()
                        .is_some_and(|t| now.duration_since(*t) > Duration::from_secs(1))
                    {
                        inner.window.pop_front();
                    }
                    inner.stats.fps = inner.window.len() as f64;
                    inner.stats.total_frames += 1;
                    inner.stats.width = width;
                    inner.stats.height = height;
                    let _ = stats_tx.send(inner.stats.clone());
                }
                Ok(Err(e)) => {
                    trace!("frame decode failed: {e}");
                    let mut inner = inner.lock().unwrap();
                    inner.stats.decode_failures += 1;
                    let _ = stats_tx.send(inner.stats.clone());
                }
                Err(_) => {} // decode task cancelled at shutdown
            }

            busy.store(false, Ordering::Release);
        });

        true
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> ViewportStats {
        self.inner.lock().unwrap().stats.clone()
    }
}

// ── Tests ────────────────────────────────────────────────────────
