//! Input events for canvas interaction.

use serde::{Deserialize, Serialize};

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Button pressed.
    Down,
    /// Pointer moved.
    Move,
    /// Button released.
    Up,
    /// Pointer left the canvas; treated like [`PointerPhase::Up`].
    Leave,
}

impl PointerPhase {
    /// Whether this phase ends a stroke.
    #[must_use]
    pub const fn ends_stroke(self) -> bool {
        matches!(self, Self::Up | Self::Leave)
    }
}

/// A pointer event in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Event phase.
    pub phase: PointerPhase,
    /// X position in view pixels.
    pub x: f32,
    /// Y position in view pixels.
    pub y: f32,
}

impl PointerEvent {
    /// Create a new pointer event.
    #[must_use]
    pub const fn new(phase: PointerPhase, x: f32, y: f32) -> Self {
        Self { phase, x, y }
    }
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyModifiers {
    /// Shift key pressed.
    #[serde(default)]
    pub shift: bool,
    /// Control key pressed.
    #[serde(default)]
    pub ctrl: bool,
    /// Alt/Option key pressed.
    #[serde(default)]
    pub alt: bool,
    /// Meta/Command key pressed.
    #[serde(default)]
    pub meta: bool,
}

impl KeyModifiers {
    /// Ctrl on most platforms, Command on macOS.
    #[must_use]
    pub const fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// Commands reachable from keyboard shortcuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorCommand {
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
    /// Save the canvas through the gateway.
    Save,
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key name, e.g. `"z"` or `"Z"`.
    pub key: String,
    /// Active modifier keys.
    #[serde(default)]
    pub modifiers: KeyModifiers,
}

impl KeyEvent {
    /// Create a key event.
    pub fn new(key: impl Into<String>, modifiers: KeyModifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }

    /// Map the key press to an editor command.
    ///
    /// `mod+Z` undoes, `mod+Shift+Z` redoes, `mod+S` saves, where `mod` is
    /// Ctrl or Meta.
    #[must_use]
    pub fn command(&self) -> Option<EditorCommand> {
        if !self.modifiers.command() {
            return None;
        }
        match self.key.to_ascii_lowercase().as_str() {
            "z" if self.modifiers.shift => Some(EditorCommand::Redo),
            "z" => Some(EditorCommand::Undo),
            "s" => Some(EditorCommand::Save),
            _ => None,
        }
    }
}
