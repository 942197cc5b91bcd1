//! Key acceptance filters.
//!
//! A [`KeyFilter`] decides whether a key event takes part in decoding at
//! all. Rejected events are dropped before any state changes: they neither
//! append to the buffer nor rearm the idle timer.
//!
//! # Examples
//!
//! ```
//! use ps_core::KeyInput;
//! use ps_decoder::{DigitsOnlyFilter, KeyFilter, ScannerKeyFilter};
//!
//! let filter = ScannerKeyFilter;
//! assert!(filter.accepts(&KeyInput::from('7')));
//! assert!(filter.accepts(&KeyInput::from('a')));
//! assert!(filter.accepts(&KeyInput::enter()));
//! assert!(!filter.accepts(&KeyInput::new("Shift")));
//!
//! let strict = DigitsOnlyFilter;
//! assert!(!strict.accepts(&KeyInput::from('a')));
//! ```

use ps_core::KeyInput;

/// A predicate over key events.
///
/// Filters must be [`Send`] and [`Sync`] because key events may be
/// delivered from any thread of a multi-threaded host.
///
/// # Examples
///
/// ```
/// use ps_core::KeyInput;
/// use ps_decoder::KeyFilter;
///
/// /// Accepts hexadecimal digits, for scanners configured to emit hex.
/// struct HexFilter;
///
/// impl KeyFilter for HexFilter {
///     fn accepts(&self, key: &KeyInput) -> bool {
///         key.is_terminator()
///             || (key.is_single_char() && key.key().chars().all(|c| c.is_ascii_hexdigit()))
///     }
/// }
/// ```
pub trait KeyFilter: Send + Sync + 'static {
    /// Returns `true` if the event should reach the decoder.
    fn accepts(&self, key: &KeyInput) -> bool;
}

impl<F> KeyFilter for F
where
    F: Fn(&KeyInput) -> bool + Send + Sync + 'static,
{
    #[inline]
    fn accepts(&self, key: &KeyInput) -> bool {
        self(key)
    }
}

/// The default filter used by keyboard-wedge scanners.
///
/// Accepts an event if its key name is a single character, is `Enter`, or
/// is a single ASCII digit. The digit check is subsumed by the
/// single-character check, so any printable key such as `"a"` is accepted
/// and accumulated. Use [`DigitsOnlyFilter`] to reject letters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScannerKeyFilter;

impl KeyFilter for ScannerKeyFilter {
    #[inline]
    fn accepts(&self, key: &KeyInput) -> bool {
        key.is_single_char() || key.is_terminator() || key.is_ascii_digit()
    }
}

/// A strict filter that accepts only ASCII digits and `Enter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitsOnlyFilter;

impl KeyFilter for DigitsOnlyFilter {
    #[inline]
    fn accepts(&self, key: &KeyInput) -> bool {
        key.is_ascii_digit() || key.is_terminator()
    }
}
