//! Touch gesture recognition.
//!
//! A small state machine keyed by the number of simultaneous
//! contacts, classifying raw touch events into remote input commands:
//!
//! ```text
//!  1 contact   tap → left click        hold 500 ms → drag
//!              move → pointer move     double tap (zoomed) → reset view
//!  2 contacts  pinch → zoom            drift → scroll
//!              still tap → right click
//!  3 contacts  → middle click
//! ```
//!
//! All classification is synchronous inside the event methods; the
//! only timer is the long-press deadline, checked by [`poll`]. The
//! recognizer consults the shared [`Camera`] for coordinate mapping
//! and drives zoom directly from pinch input.
//!
//! [`poll`]: GestureRecognizer::poll
//! [`Camera`]: crate::viewport::Camera

pub mod pointer;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::protocol::{InputCommand, MouseButton};
use crate::viewport::SharedCamera;

pub use pointer::PointerInput;

// ── Tuning constants ─────────────────────────────────────────────

/// Hold this long without moving to start a drag.
pub const LONG_PRESS: Duration = Duration::from_millis(500);
/// A touch released after this is no longer a tap.
pub const TAP_MAX_DURATION: Duration = Duration::from_millis(200);
/// Second tap within this window of the first counts as a double tap.
pub const DOUBLE_TAP_WINDOW: Duration = Duration::from_millis(300);
/// Movement beyond this (px) cancels tap candidacy.
pub const TAP_SLOP: f64 = 10.0;
/// Pairwise-distance change (px) that classifies a pinch.
pub const PINCH_THRESHOLD: f64 = 15.0;
/// Midpoint drift (px) that classifies a two-finger scroll.
pub const SCROLL_THRESHOLD: f64 = 3.0;
/// Scroll deltas are scaled by this and sign-inverted (natural
/// scrolling).
pub const SCROLL_MULTIPLIER: f64 = 0.5;

// ── InputMode ────────────────────────────────────────────────────

/// How single-finger movement maps to the remote pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Finger movement is a relative delta, like a laptop touchpad.
    #[default]
    Touchpad,
    /// The finger position maps through the viewport to an absolute
    /// remote coordinate.
    Direct,
}

// ── GestureEvent ─────────────────────────────────────────────────

/// Haptic pulse intensity for discrete gesture outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Haptic {
    Light,
    Medium,
}

/// Outputs of the recognizer: commands for the session's command
/// channel plus best-effort haptic cues.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEvent {
    Command(InputCommand),
    Haptic(Haptic),
}

// ── Contact tracking ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Contact {
    origin: (f64, f64),
    pos: (f64, f64),
}

#[derive(Debug, Default)]
struct TwoFinger {
    origin_mid: (f64, f64),
    baseline_distance: f64,
    pinch_detected: bool,
    scrolled: bool,
}

// ── GestureRecognizer ────────────────────────────────────────────

/// Per-contact tracking plus the session-level flags of the gesture
/// in progress. Create one per viewport.
pub struct GestureRecognizer {
    camera: SharedCamera,
    mode: InputMode,
    contacts: HashMap<u64, Contact>,
    /// Highest simultaneous contact count of the current gesture.
    peak_contacts: usize,
    tap_candidate: bool,
    dragging: bool,
    touch_start: Option<Instant>,
    last_tap: Option<Instant>,
    two_finger: Option<TwoFinger>,
}

impl GestureRecognizer {
    pub fn new(camera: SharedCamera) -> Self {
        Self {
            camera,
            mode: InputMode::default(),
            contacts: HashMap::new(),
            peak_contacts: 0,
            tap_candidate: false,
            dragging: false,
            touch_start: None,
            last_tap: None,
            two_finger: None,
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    /// Number of contacts currently down.
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// A new contact landed.
    pub fn touch_start(&mut self, id: u64, x: f64, y: f64, now: Instant) -> Vec<GestureEvent> {
        self.contacts.insert(
            id,
            Contact {
                origin: (x, y),
                pos: (x, y),
            },
        );
        let count = self.contacts.len();
        self.peak_contacts = self.peak_contacts.max(count);

        match count {
            1 => {
                self.tap_candidate = true;
                self.dragging = false;
                self.touch_start = Some(now);
                Vec::new()
            }
            2 => {
                // Second finger cancels tap and long-press candidacy.
                self.tap_candidate = false;
                self.touch_start = None;
                let (mid, dist) = self.pair_geometry();
                self.two_finger = Some(TwoFinger {
                    origin_mid: mid,
                    baseline_distance: dist,
                    pinch_detected: false,
                    scrolled: false,
                });
                Vec::new()
            }
            3 => {
                trace!("three-finger tap");
                self.two_finger = None;
                vec![
                    GestureEvent::Command(InputCommand::click(MouseButton::Middle)),
                    GestureEvent::Haptic(Haptic::Light),
                ]
            }
            _ => Vec::new(),
        }
    }

    /// A tracked contact moved.
    pub fn touch_move(&mut self, id: u64, x: f64, y: f64, _now: Instant) -> Vec<GestureEvent> {
        let Some(contact) = self.contacts.get_mut(&id) else {
            return Vec::new();
        };
        let prev = contact.pos;
        contact.pos = (x, y);
        let origin = contact.origin;

        match self.contacts.len() {
            1 => self.one_finger_move(origin, prev, (x, y)),
            2 => self.two_finger_move(),
            _ => Vec::new(),
        }
    }

    /// A contact lifted.
    pub fn touch_end(&mut self, id: u64, now: Instant) -> Vec<GestureEvent> {
        let count_at_release = self.contacts.len();
        let release_pos = self.contacts.get(&id).map(|c| c.pos);
        if self.contacts.remove(&id).is_none() {
            return Vec::new();
        }

        let mut out = Vec::new();

        if self.dragging && self.contacts.is_empty() {
            out.push(GestureEvent::Command(InputCommand::MouseUp {
                button: MouseButton::Left,
            }));
        } else if count_at_release == 2 && self.peak_contacts == 2 {
            if let Some(tf) = &self.two_finger {
                if !tf.pinch_detected && !tf.scrolled {
                    trace!("two-finger tap");
                    out.push(GestureEvent::Command(InputCommand::click(
                        MouseButton::Right,
                    )));
                    out.push(GestureEvent::Haptic(Haptic::Light));
                }
            }
            self.two_finger = None;
        } else if count_at_release == 1 && self.tap_candidate {
            if let Some(start) = self.touch_start {
                if now.duration_since(start) < TAP_MAX_DURATION {
                    out.extend(self.classify_tap(release_pos, now));
                }
            }
        }

        if self.contacts.is_empty() {
            let last_tap = self.last_tap;
            self.reset();
            self.last_tap = last_tap;
        }
        out
    }

    /// Variant of [`touch_end`](Self::touch_end) carrying the release
    /// position, needed for direct-mode taps.
    pub fn touch_end_at(&mut self, id: u64, x: f64, y: f64, now: Instant) -> Vec<GestureEvent> {
        if let Some(contact) = self.contacts.get_mut(&id) {
            contact.pos = (x, y);
        }
        self.touch_end(id, now)
    }

    /// Check the long-press deadline. Call periodically (or on a
    /// timer) while a single contact is held.
    pub fn poll(&mut self, now: Instant) -> Vec<GestureEvent> {
        if self.contacts.len() != 1 || !self.tap_candidate || self.dragging {
            return Vec::new();
        }
        let Some(start) = self.touch_start else {
            return Vec::new();
        };
        if now.duration_since(start) < LONG_PRESS {
            return Vec::new();
        }

        trace!("long press, drag start");
        self.tap_candidate = false;
        self.dragging = true;
        vec![
            GestureEvent::Command(InputCommand::MouseDown {
                button: MouseButton::Left,
            }),
            GestureEvent::Haptic(Haptic::Medium),
        ]
    }

    /// Drop all gesture state, keeping nothing but the configuration.
    pub fn reset(&mut self) {
        self.contacts.clear();
        self.peak_contacts = 0;
        self.tap_candidate = false;
        self.dragging = false;
        self.touch_start = None;
        self.two_finger = None;
        self.last_tap = None;
    }

    // ── One-finger handling ──────────────────────────────────────

    fn one_finger_move(
        &mut self,
        origin: (f64, f64),
        prev: (f64, f64),
        pos: (f64, f64),
    ) -> Vec<GestureEvent> {
        if self.tap_candidate {
            if distance(origin, pos) <= TAP_SLOP {
                return Vec::new();
            }
            self.tap_candidate = false;
        }

        let cmd = match self.mode {
            InputMode::Touchpad => {
                InputCommand::move_relative(pos.0 - prev.0, pos.1 - prev.1)
            }
            InputMode::Direct => {
                let mapped = self.camera.lock().unwrap().viewport_to_remote(pos.0, pos.1);
                match mapped {
                    Some((rx, ry)) => InputCommand::move_absolute(rx, ry),
                    None => return Vec::new(), // letterbox margin
                }
            }
        };
        vec![GestureEvent::Command(cmd)]
    }

    fn classify_tap(&mut self, release_pos: Option<(f64, f64)>, now: Instant) -> Vec<GestureEvent> {
        let zoomed = self.camera.lock().unwrap().scale() > 1.0;
        let is_double = self
            .last_tap
            .is_some_and(|prev| now.duration_since(prev) <= DOUBLE_TAP_WINDOW);

        if is_double && zoomed {
            trace!("double tap, reset view");
            self.camera.lock().unwrap().reset();
            self.last_tap = None;
            return vec![GestureEvent::Haptic(Haptic::Light)];
        }

        self.last_tap = Some(now);
        let cmd = match (self.mode, release_pos) {
            (InputMode::Direct, Some((x, y))) => {
                match self.camera.lock().unwrap().viewport_to_remote(x, y) {
                    Some((rx, ry)) => InputCommand::click_at(MouseButton::Left, rx, ry),
                    None => return Vec::new(),
                }
            }
            _ => InputCommand::click(MouseButton::Left),
        };
        vec![
            GestureEvent::Command(cmd),
            GestureEvent::Haptic(Haptic::Light),
        ]
    }

    // ── Two-finger handling ──────────────────────────────────────

    fn pair_geometry(&self) -> ((f64, f64), f64) {
        let mut it = self.contacts.values();
        match (it.next(), it.next()) {
            (Some(a), Some(b)) => {
                let mid = ((a.pos.0 + b.pos.0) / 2.0, (a.pos.1 + b.pos.1) / 2.0);
                (mid, distance(a.pos, b.pos))
            }
            _ => ((0.0, 0.0), 0.0),
        }
    }

    fn two_finger_move(&mut self) -> Vec<GestureEvent> {
        let (mid, dist) = self.pair_geometry();
        let Some(tf) = self.two_finger.as_mut() else {
            return Vec::new();
        };

        // Pinch wins over scroll for the life of this contact set.
        if tf.pinch_detected || (dist - tf.baseline_distance).abs() > PINCH_THRESHOLD {
            let factor = if tf.baseline_distance > 0.0 {
                dist / tf.baseline_distance
            } else {
                1.0
            };
            tf.pinch_detected = true;
            tf.baseline_distance = dist;
            tf.origin_mid = mid;
            self.camera.lock().unwrap().zoom(factor, mid.0, mid.1);
            return Vec::new();
        }

        let drift = (mid.0 - tf.origin_mid.0, mid.1 - tf.origin_mid.1);
        if drift.0.hypot(drift.1) > SCROLL_THRESHOLD {
            tf.scrolled = true;
            tf.origin_mid = mid;
            return vec![GestureEvent::Command(InputCommand::MouseScroll {
                dx: -drift.0 * SCROLL_MULTIPLIER,
                dy: -drift.1 * SCROLL_MULTIPLIER,
            })];
        }

        Vec::new()
    }
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

// ── Tests ────────────────────────────────────────────────────────
