// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input state handed to commands.
//!
//! The UI layer converts raw events into a [`CommandInput`] before calling
//! the responder; coordinates are already transformed to logical space.

/// Pointer buttons held during an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointerButtons {
    /// Primary (left) button
    pub primary: bool,
    /// Middle button
    pub middle: bool,
    /// Secondary (right) button
    pub secondary: bool,
}

impl PointerButtons {
    /// No buttons
    pub const NONE: Self = Self { primary: false, middle: false, secondary: false };
    /// Primary only
    pub const PRIMARY: Self = Self { primary: true, middle: false, secondary: false };
    /// Middle only
    pub const MIDDLE: Self = Self { primary: false, middle: true, secondary: false };
    /// Secondary only
    pub const SECONDARY: Self = Self { primary: false, middle: false, secondary: true };
}

/// Modifier keys held during an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    /// Control key (Cmd on macOS)
    pub ctrl: bool,
    /// Shift key
    pub shift: bool,
    /// Alt key (Option on macOS)
    pub alt: bool,
}

impl Modifiers {
    /// No modifiers
    pub const NONE: Self = Self { ctrl: false, shift: false, alt: false };
    /// Control only
    pub const CTRL: Self = Self { ctrl: true, shift: false, alt: false };
    /// Shift only
    pub const SHIFT: Self = Self { ctrl: false, shift: true, alt: false };
    /// Alt only
    pub const ALT: Self = Self { ctrl: false, shift: false, alt: true };
    /// Control + Shift
    pub const CTRL_SHIFT: Self = Self { ctrl: true, shift: true, alt: false };
}

impl std::fmt::Display for Modifiers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// One event's worth of input, as seen by a command.
///
/// A value type: commands read it during a call and only a modal command's
/// own transient state outlives the call. `matched_command` is filled in
/// by the registry lookup.
#[derive(Debug, Clone, Default)]
pub struct CommandInput {
    /// Pointer buttons held
    pub buttons: PointerButtons,
    /// Modifier keys held
    pub modifiers: Modifiers,
    /// Key code, if a key event
    pub key: Option<u32>,
    /// Whether this is a double click
    pub double_click: bool,
    /// Pointer position in logical space
    pub position: [f32; 2],
    /// Free-text metadata (e.g. the operator name for an add-node command)
    pub metadata: String,
    /// Identifier of the command the lookup matched
    pub matched_command: Option<String>,
}

impl CommandInput {
    /// Input for a pointer event
    pub fn pointer(buttons: PointerButtons, modifiers: Modifiers, x: f32, y: f32) -> Self {
        Self {
            buttons,
            modifiers,
            position: [x, y],
            ..Self::default()
        }
    }

    /// Input for a key event
    pub fn key(key: u32, modifiers: Modifiers) -> Self {
        Self {
            key: Some(key),
            modifiers,
            ..Self::default()
        }
    }

    /// Input carrying only metadata, used by direct widget invocations
    pub fn with_metadata(metadata: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
            ..Self::default()
        }
    }

    /// Mark the input as a double click
    pub fn double_click(mut self) -> Self {
        self.double_click = true;
        self
    }
}
