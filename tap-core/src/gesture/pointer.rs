//! Reduced-fidelity pointer (mouse/trackpad) input path.
//!
//! No tap, long-press, or multi-contact semantics: movement streams
//! only while the primary button is held, the secondary button maps
//! straight to a right-click, and wheel events become scroll commands
//! with a fixed divisor.

use crate::protocol::{InputCommand, MouseButton};

/// Wheel deltas arrive in line-sized steps; this tames them to the
/// scroll granularity the server expects.
pub const WHEEL_DIVISOR: f64 = 3.0;

/// Stateful translator from pointer events to input commands.
#[derive(Debug, Default)]
pub struct PointerInput {
    primary_held: bool,
}

impl PointerInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Primary button pressed: start a drag.
    pub fn primary_down(&mut self) -> Option<InputCommand> {
        if self.primary_held {
            return None;
        }
        self.primary_held = true;
        Some(InputCommand::MouseDown {
            button: MouseButton::Left,
        })
    }

    /// Primary button released: end the drag.
    pub fn primary_up(&mut self) -> Option<InputCommand> {
        if !self.primary_held {
            return None;
        }
        self.primary_held = false;
        Some(InputCommand::MouseUp {
            button: MouseButton::Left,
        })
    }

    /// Secondary button maps directly to a right-click.
    pub fn secondary_click(&self) -> InputCommand {
        InputCommand::click(MouseButton::Right)
    }

    /// Pointer motion; emits only while the primary button is held.
    pub fn motion(&self, dx: f64, dy: f64) -> Option<InputCommand> {
        self.primary_held
            .then(|| InputCommand::move_relative(dx, dy))
    }

    /// Wheel movement, divided down to scroll steps.
    pub fn wheel(&self, dx: f64, dy: f64) -> InputCommand {
        InputCommand::MouseScroll {
            dx: dx / WHEEL_DIVISOR,
            dy: dy / WHEEL_DIVISOR,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.primary_held
    }
}

// ── Tests ────────────────────────────────────────────────────────
