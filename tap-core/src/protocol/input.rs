//! Structured input commands sent on the command channel.
//!
//! Each command serializes to a JSON object with a snake_case `type`
//! tag, matching what the server's input handler dispatches on.
//! Commands are fire-and-forget: the client never waits for a
//! response, and a command sent while the channel is down is dropped.

use serde::{Deserialize, Serialize};

// ── MouseButton ──────────────────────────────────────────────────

/// Mouse button identifier, lowercase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

// ── ClipboardAction ──────────────────────────────────────────────

/// Direction of a clipboard sync exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipboardAction {
    Get,
    Set,
}

// ── InputCommand ─────────────────────────────────────────────────

/// A single remote-input command.
///
/// Relative `mouse_move` deltas are additionally scaled server-side
/// by the sensitivity last set via [`InputCommand::SetSensitivity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputCommand {
    /// Move the pointer. `relative = true` carries a delta,
    /// `relative = false` an absolute remote-screen coordinate.
    MouseMove { x: f64, y: f64, relative: bool },

    /// Click a button, optionally at an absolute position.
    MouseClick {
        button: MouseButton,
        #[serde(default = "default_click_count")]
        count: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<f64>,
    },

    /// Press and hold a button (drag start).
    MouseDown { button: MouseButton },

    /// Release a held button (drag end).
    MouseUp { button: MouseButton },

    /// Scroll by the given deltas.
    MouseScroll { dx: f64, dy: f64 },

    /// Press a single key, with optional held modifiers.
    KeyPress {
        key: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        modifiers: Vec<String>,
    },

    /// Press a chord of keys simultaneously.
    KeyCombo { keys: Vec<String> },

    /// Type a string of text verbatim.
    TypeText { text: String },

    /// Set the server-side pointer sensitivity multiplier.
    SetSensitivity { value: f64 },

    /// Read or write the remote clipboard.
    ClipboardSync {
        action: ClipboardAction,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },
}

fn default_click_count() -> u32 {
    1
}

impl InputCommand {
    /// A single left/right/middle click with no position.
    pub fn click(button: MouseButton) -> Self {
        Self::MouseClick {
            button,
            count: 1,
            x: None,
            y: None,
        }
    }

    /// A single click at an absolute remote coordinate.
    pub fn click_at(button: MouseButton, x: f64, y: f64) -> Self {
        Self::MouseClick {
            button,
            count: 1,
            x: Some(x),
            y: Some(y),
        }
    }

    /// A relative pointer movement.
    pub fn move_relative(dx: f64, dy: f64) -> Self {
        Self::MouseMove {
            x: dx,
            y: dy,
            relative: true,
        }
    }

    /// An absolute pointer movement.
    pub fn move_absolute(x: f64, y: f64) -> Self {
        Self::MouseMove {
            x,
            y,
            relative: false,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn json(cmd: &InputCommand) -> String {
        serde_json::to_string(cmd).unwrap()
    }

    #[test]
    fn mouse_move_wire_format() {
        let cmd = InputCommand::move_relative(4.0, -2.5);
        assert_eq!(json(&cmd), r#"{"type":"mouse_move","x":4.0,"y":-2.5,"relative":true}"#);

        let cmd = InputCommand::move_absolute(800.0, 600.0);
        assert_eq!(json(&cmd), r#"{"type":"mouse_move","x":800.0,"y":600.0,"relative":false}"#);
    }

    #[test]
    fn click_omits_absent_position() {
        let cmd = InputCommand::click(MouseButton::Right);
        assert_eq!(json(&cmd), r#"{"type":"mouse_click","button":"right","count":1}"#);

        let cmd = InputCommand::click_at(MouseButton::Left, 10.0, 20.0);
        assert_eq!(
            json(&cmd),
            r#"{"type":"mouse_click","button":"left","count":1,"x":10.0,"y":20.0}"#
        );
    }

    #[test]
    fn drag_pair_wire_format() {
        let down = InputCommand::MouseDown {
            button: MouseButton::Left,
        };
        let up = InputCommand::MouseUp {
            button: MouseButton::Left,
        };
        assert_eq!(json(&down), r#"{"type":"mouse_down","button":"left"}"#);
        assert_eq!(json(&up), r#"{"type":"mouse_up","button":"left"}"#);
    }

    #[test]
    fn scroll_wire_format() {
        let cmd = InputCommand::MouseScroll { dx: -1.5, dy: 3.0 };
        assert_eq!(json(&cmd), r#"{"type":"mouse_scroll","dx":-1.5,"dy":3.0}"#);
    }

    #[test]
    fn keyboard_wire_formats() {
        let cmd = InputCommand::KeyPress {
            key: "enter".into(),
            modifiers: vec![],
        };
        assert_eq!(json(&cmd), r#"{"type":"key_press","key":"enter"}"#);

        let cmd = InputCommand::KeyPress {
            key: "c".into(),
            modifiers: vec!["ctrl".into()],
        };
        assert_eq!(json(&cmd), r#"{"type":"key_press","key":"c","modifiers":["ctrl"]}"#);

        let cmd = InputCommand::KeyCombo {
            keys: vec!["ctrl".into(), "alt".into(), "t".into()],
        };
        assert_eq!(json(&cmd), r#"{"type":"key_combo","keys":["ctrl","alt","t"]}"#);

        let cmd = InputCommand::TypeText { text: "hi".into() };
        assert_eq!(json(&cmd), r#"{"type":"type_text","text":"hi"}"#);
    }

    #[test]
    fn sensitivity_and_clipboard_wire_formats() {
        let cmd = InputCommand::SetSensitivity { value: 1.5 };
        assert_eq!(json(&cmd), r#"{"type":"set_sensitivity","value":1.5}"#);

        let cmd = InputCommand::ClipboardSync {
            action: ClipboardAction::Get,
            content: None,
        };
        assert_eq!(json(&cmd), r#"{"type":"clipboard_sync","action":"get"}"#);
    }

    #[test]
    fn roundtrip_preserves_command() {
        let cmd = InputCommand::click_at(MouseButton::Middle, 1.0, 2.0);
        let parsed: InputCommand = serde_json::from_str(&json(&cmd)).unwrap();
        assert_eq!(parsed, cmd);
    }
}
