use serde::{Deserialize, Serialize};

/// Identifier for a physical keyboard key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Named(NamedKey),
    /// Letter keys, always upper case.
    Character(char),
}

impl KeyCode {
    /// Letter key for `ch`, case-insensitive.
    pub fn character(ch: char) -> Self {
        Self::Character(ch.to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Escape,
}

/// Phase of a key event. Auto-repeat is reported separately from the
/// initial press so one-shot bindings can ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    Press,
    Repeat,
    Release,
}

/// Identifier for a mouse button (left button is zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MouseButton(u8);

impl MouseButton {
    pub const LEFT: Self = Self(0);
    pub const RIGHT: Self = Self(1);

    pub fn new(index: u8) -> Self {
        Self(index)
    }
}
