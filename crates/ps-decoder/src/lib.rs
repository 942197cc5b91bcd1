//! Keyboard-wedge barcode scanner decoder.
//!
//! USB and Bluetooth barcode scanners usually present themselves as
//! keyboards: a scan arrives as a burst of key presses followed by `Enter`,
//! on the same stream as the cashier's own typing. This crate separates the
//! two and reports complete barcodes only.
//!
//! # Overview
//!
//! - [`KeySource`] delivers key events ([`KeyBus`] is the in-process one)
//! - [`KeyFilter`] decides which events take part in decoding
//! - [`Scheduler`] runs the idle timer ([`TokioScheduler`] in production,
//!   [`ManualScheduler`] under a virtual clock)
//! - [`BarcodeDecoder`] owns the buffer and the state machine
//! - [`attach`] wires them together and returns a [`DecoderHandle`]
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  publish   ┌──────────────┐  handle_event  ┌────────────────┐
//! │ Host keyboard │ ─────────► │ KeyBus       │ ─────────────► │ BarcodeDecoder │
//! │ (terminal/UI) │            │ (KeySource)  │                │ buffer + timer │
//! └───────────────┘            └──────────────┘                └───────┬────────┘
//!                                                                      │
//!                        schedule_once / cancel                        │
//!                  ┌───────────────────────────────────────────────────┤
//!                  ▼                                                   ▼
//!          ┌──────────────┐                                 on_decoded(barcode)
//!          │ Scheduler    │ ── idle timeout ──► clear          on_invalid()
//!          └──────────────┘
//! ```
//!
//! # Crate Dependencies
//!
//! ```text
//! ps-cli ──► ps-decoder ──► ps-core
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ps_core::{DecoderConfig, KeyInput};
//! use ps_decoder::{attach, KeyBus, KeySource, Scheduler, TokioScheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ps_decoder::DecoderError> {
//!     let bus = Arc::new(KeyBus::new());
//!     let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler::current()?);
//!
//!     let _handle = attach(
//!         Arc::clone(&bus) as Arc<dyn KeySource>,
//!         scheduler,
//!         DecoderConfig::default(),
//!         |barcode| println!("scanned {barcode}"),
//!         Some(Box::new(|| eprintln!("scan rejected"))),
//!     )?;
//!
//!     // Feed key presses from the host's keyboard hook.
//!     bus.publish(&KeyInput::from('4'));
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! Key processing never fails. Rejected keys, empty scans and bad lengths
//! are reported as [`DecodeOutcome`] values and through the callbacks.
//! [`DecoderError`] only covers setup: an invalid [`ps_core::DecoderConfig`]
//! or a missing Tokio runtime.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod decoder;
pub mod error;
pub mod events;
pub mod filter;
pub mod scheduler;
pub mod source;

// Re-export decoder types
pub use decoder::{
    attach, BarcodeDecoder, DecodedCallback, DecoderBuilder, DecoderHandle, InvalidCallback,
};

// Re-export error types
pub use error::DecoderError;

// Re-export event types
pub use events::{DecodeOutcome, DecodeStats};

// Re-export filter types
pub use filter::{DigitsOnlyFilter, KeyFilter, ScannerKeyFilter};

// Re-export scheduler types
pub use scheduler::{CancelToken, ManualScheduler, ScheduledTask, Scheduler, TokioScheduler};

// Re-export source types
pub use source::{KeyBus, KeyListener, KeySource, SubscriptionId};
