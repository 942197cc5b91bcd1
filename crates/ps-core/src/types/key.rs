//! Key-press event type.
//!
//! This module provides [`KeyInput`], the host-independent representation of
//! one key press. Keys are identified by DOM-style key names: printable keys
//! carry their character (`"7"`, `"a"`), named keys carry their name
//! (`"Enter"`, `"Shift"`, `"ArrowUp"`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single key-press event.
///
/// Only the key identifier is required by the decoder. Hosts convert their
/// native events (terminal, GUI toolkit, scripted replay) into this type.
///
/// # Examples
///
/// ```
/// use ps_core::KeyInput;
///
/// let digit = KeyInput::from('7');
/// assert!(digit.is_ascii_digit());
/// assert!(digit.is_single_char());
///
/// let enter = KeyInput::enter();
/// assert!(enter.is_terminator());
///
/// let shift = KeyInput::new("Shift");
/// assert!(!shift.is_single_char());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyInput {
    key: String,
}

impl KeyInput {
    /// Key name that terminates a scan.
    pub const TERMINATOR: &'static str = "Enter";

    /// Creates a key event from its key name.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Creates an `Enter` key event.
    #[inline]
    #[must_use]
    pub fn enter() -> Self {
        Self::new(Self::TERMINATOR)
    }

    /// Returns the key name.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns `true` if this key terminates a scan.
    #[inline]
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.key == Self::TERMINATOR
    }

    /// Returns `true` if the key name is exactly one character.
    ///
    /// A character here is one Unicode scalar value, so `"é"` counts as a
    /// single character while `"Tab"` does not.
    ///
    /// # Examples
    ///
    /// ```
    /// use ps_core::KeyInput;
    ///
    /// assert!(KeyInput::new("a").is_single_char());
    /// assert!(KeyInput::new("é").is_single_char());
    /// assert!(!KeyInput::new("Tab").is_single_char());
    /// assert!(!KeyInput::new("").is_single_char());
    /// ```
    #[must_use]
    pub fn is_single_char(&self) -> bool {
        let mut chars = self.key.chars();
        chars.next().is_some() && chars.next().is_none()
    }

    /// Returns `true` if the key name is a single ASCII digit.
    #[must_use]
    pub fn is_ascii_digit(&self) -> bool {
        matches!(self.key.as_bytes(), [b] if b.is_ascii_digit())
    }
}

impl From<char> for KeyInput {
    fn from(c: char) -> Self {
        Self { key: c.to_string() }
    }
}

impl From<&str> for KeyInput {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for KeyInput {
    fn from(key: String) -> Self {
        Self { key }
    }
}

impl fmt::Display for KeyInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
