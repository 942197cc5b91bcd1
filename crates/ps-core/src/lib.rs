//! Core types, configuration, and errors for the pos-scan workspace.
//!
//! This crate provides the foundational types shared by the decoder and the
//! command-line host:
//!
//! - [`KeyInput`] - a single key-press event identified by its key name
//! - [`Barcode`] and [`Symbology`] - decoded scanner payloads
//! - [`DecoderConfig`] and [`Config`] - serde-backed configuration
//! - [`ConfigError`] - configuration loading and validation failures

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CliConfig, Config, DecoderConfig};
pub use error::ConfigError;
pub use types::{Barcode, KeyInput, Symbology};
