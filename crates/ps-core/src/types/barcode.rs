//! Decoded barcode types.
//!
//! This module provides the [`Barcode`] newtype emitted by the decoder and
//! the [`Symbology`] enum describing the common retail formats by length.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Retail barcode symbology, inferred from payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Symbology {
    /// EAN-8, eight characters.
    Ean8,
    /// EAN-13, thirteen characters.
    Ean13,
}

impl Symbology {
    /// Returns the payload length of this symbology.
    #[inline]
    #[must_use]
    pub const fn payload_len(self) -> usize {
        match self {
            Self::Ean8 => 8,
            Self::Ean13 => 13,
        }
    }

    /// Returns the symbology with the given payload length, if any.
    #[inline]
    #[must_use]
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            8 => Some(Self::Ean8),
            13 => Some(Self::Ean13),
            _ => None,
        }
    }

    /// Returns a human-readable label.
    #[inline]
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Ean8 => "EAN-8",
            Self::Ean13 => "EAN-13",
        }
    }
}

/// A barcode payload accepted by the decoder.
///
/// The decoder stores exactly the characters it accumulated, in order. It
/// never pads or normalizes the payload; see
/// [`to_ean13_padded`](Self::to_ean13_padded) for the caller-side helper.
///
/// # Examples
///
/// ```
/// use ps_core::{Barcode, Symbology};
///
/// let code = Barcode::new("96385074");
/// assert_eq!(code.len(), 8);
/// assert_eq!(code.symbology(), Some(Symbology::Ean8));
/// assert_eq!(code.to_ean13_padded().as_deref(), Some("0000096385074"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Barcode(String);

impl Barcode {
    /// Wraps a payload string.
    #[inline]
    #[must_use]
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Returns the payload.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the barcode, returning the payload.
    #[inline]
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns the payload length in characters.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    /// Returns `true` if the payload is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `true` if every character is an ASCII digit.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        !self.0.is_empty() && self.0.bytes().all(|b| b.is_ascii_digit())
    }

    /// Returns the symbology matching the payload length.
    #[inline]
    #[must_use]
    pub fn symbology(&self) -> Option<Symbology> {
        Symbology::from_len(self.len())
    }

    /// Left-pads the payload with zeros to thirteen characters.
    ///
    /// Product catalogs keyed on EAN-13 store EAN-8 codes this way. Returns
    /// `None` if the payload is longer than thirteen characters.
    #[must_use]
    pub fn to_ean13_padded(&self) -> Option<String> {
        let len = self.len();
        let target = Symbology::Ean13.payload_len();
        if len > target {
            return None;
        }
        let mut padded = "0".repeat(target - len);
        padded.push_str(&self.0);
        Some(padded)
    }
}

impl fmt::Display for Barcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Barcode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<Barcode> for String {
    fn from(barcode: Barcode) -> Self {
        barcode.0
    }
}
