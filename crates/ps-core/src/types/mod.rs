//! Domain types for pos-scan.
//!
//! - [`key`] - key-press events as seen by the decoder
//! - [`barcode`] - decoded barcodes and their symbology
//!
//! All public types are re-exported here and at the crate root:
//!
//! ```
//! use ps_core::{Barcode, KeyInput};
//! ```

mod barcode;
mod key;

pub use barcode::{Barcode, Symbology};
pub use key::KeyInput;
