//! Outcome types for decoded key events.
//!
//! Every key event fed to the decoder produces one [`DecodeOutcome`]. The
//! decoder also keeps running [`DecodeStats`] for diagnostics.
//!
//! # Event Flow
//!
//! ```text
//!   KeyInput
//!      │
//!      ▼
//!   KeyFilter ──── rejected ───► Ignored
//!      │
//!      ▼
//!   rearm idle timer
//!      │
//!      ├── not Enter ──────────► Accumulated { len }
//!      │
//!      └── Enter
//!            ├── empty buffer ─► Empty
//!            ├── bad length ───► Invalid { len }   (on_invalid)
//!            └── good length ──► Decoded(barcode)  (on_decoded)
//! ```

use ps_core::Barcode;
use serde::{Deserialize, Serialize};

/// The result of processing one key event.
///
/// # Examples
///
/// ```
/// use ps_core::Barcode;
/// use ps_decoder::DecodeOutcome;
///
/// let outcome = DecodeOutcome::Decoded(Barcode::new("12345678"));
/// assert!(outcome.is_terminal());
/// assert_eq!(outcome.barcode().map(Barcode::as_str), Some("12345678"));
///
/// assert!(!DecodeOutcome::Accumulated { len: 3 }.is_terminal());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeOutcome {
    /// The key failed the acceptance filter. Nothing changed.
    Ignored,

    /// The key was appended; the buffer now holds `len` characters.
    Accumulated {
        /// Buffer length after the append.
        len: usize,
    },

    /// `Enter` arrived with nothing buffered.
    Empty,

    /// `Enter` arrived with a buffer of a length outside the valid set.
    Invalid {
        /// Length of the discarded buffer.
        len: usize,
    },

    /// `Enter` arrived with a buffer of a valid length.
    Decoded(Barcode),

    /// The decoder has been detached and no longer processes events.
    Detached,
}

impl DecodeOutcome {
    /// Returns `true` if this outcome ended a scan (decoded or invalid).
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Decoded(_) | Self::Invalid { .. })
    }

    /// Returns the decoded barcode, if any.
    #[inline]
    #[must_use]
    pub const fn barcode(&self) -> Option<&Barcode> {
        match self {
            Self::Decoded(barcode) => Some(barcode),
            _ => None,
        }
    }

    /// Consumes the outcome, returning the decoded barcode, if any.
    #[inline]
    #[must_use]
    pub fn into_barcode(self) -> Option<Barcode> {
        match self {
            Self::Decoded(barcode) => Some(barcode),
            _ => None,
        }
    }
}

/// Running counters kept by a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeStats {
    /// Barcodes decoded successfully.
    pub decoded: u64,

    /// Scans discarded for an invalid length.
    pub invalid: u64,

    /// Key events rejected by the acceptance filter.
    pub ignored: u64,

    /// Partial scans discarded by the idle timeout.
    pub timeouts: u64,

    /// `Enter` presses with an empty buffer.
    pub empty_terminators: u64,
}

impl DecodeStats {
    /// Total number of scans that reached a terminal outcome.
    #[inline]
    #[must_use]
    pub const fn scans(&self) -> u64 {
        self.decoded + self.invalid
    }

    /// Share of terminal scans that decoded, as a percentage.
    ///
    /// Returns `100.0` when no scan has completed yet.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Counters stay far below 2^52
    pub fn success_percent(&self) -> f64 {
        let scans = self.scans();
        if scans == 0 {
            return 100.0;
        }
        self.decoded as f64 / scans as f64 * 100.0
    }

    pub(crate) fn record(&mut self, outcome: &DecodeOutcome) {
        match outcome {
            DecodeOutcome::Ignored => self.ignored += 1,
            DecodeOutcome::Empty => self.empty_terminators += 1,
            DecodeOutcome::Invalid { .. } => self.invalid += 1,
            DecodeOutcome::Decoded(_) => self.decoded += 1,
            DecodeOutcome::Accumulated { .. } | DecodeOutcome::Detached => {}
        }
    }
}
