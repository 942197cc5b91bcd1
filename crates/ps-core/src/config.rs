//! Configuration structures for pos-scan.
//!
//! This module provides configuration types for all components of the application:
//!
//! - [`DecoderConfig`] - Barcode decoder settings (idle timeout, length policy)
//! - [`CliConfig`] - Terminal host settings
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! missing fields filled from those defaults.

use std::time::Duration;

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::ConfigError;

/// Configuration for the barcode decoder.
///
/// # Examples
///
/// ```
/// use ps_core::DecoderConfig;
///
/// let config = DecoderConfig::default();
/// assert_eq!(config.idle_timeout_ms, 1000);
/// assert!(config.is_valid_length(8));
/// assert!(config.is_valid_length(13));
/// assert!(!config.is_valid_length(12));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Idle timeout in milliseconds.
    ///
    /// A partially typed scan is discarded when no accepted key arrives
    /// within this window.
    pub idle_timeout_ms: u64,

    /// Accumulated lengths that decode successfully.
    ///
    /// Any other length reports an invalid scan.
    pub valid_lengths: SmallVec<[usize; 4]>,

    /// Only accept digit keys (plus `Enter`) into the buffer.
    ///
    /// Off by default: any single-character key is accumulated.
    pub digits_only: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 1000,
            valid_lengths: SmallVec::from_slice(&[8, 13]),
            digits_only: false,
        }
    }
}

impl DecoderConfig {
    /// Returns a copy with a different idle timeout.
    #[must_use]
    pub const fn with_idle_timeout_ms(mut self, idle_timeout_ms: u64) -> Self {
        self.idle_timeout_ms = idle_timeout_ms;
        self
    }

    /// Returns a copy that only accumulates digit keys.
    #[must_use]
    pub const fn digits_only(mut self) -> Self {
        self.digits_only = true;
        self
    }

    /// Returns the idle timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Returns `true` if a buffer of `len` characters decodes successfully.
    #[inline]
    #[must_use]
    pub fn is_valid_length(&self, len: usize) -> bool {
        self.valid_lengths.contains(&len)
    }

    /// Checks the configuration for values the decoder cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if the idle timeout is zero,
    /// the length list is empty, or it contains a zero length.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::invalid_option(
                "idle_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.valid_lengths.is_empty() {
            return Err(ConfigError::invalid_option(
                "valid_lengths",
                "must contain at least one length",
            ));
        }
        if self.valid_lengths.contains(&0) {
            return Err(ConfigError::invalid_option(
                "valid_lengths",
                "lengths must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Configuration for the terminal host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Key name that stops `pos-scan listen`.
    pub quit_key: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            quit_key: "Escape".to_owned(),
        }
    }
}

/// Root configuration for pos-scan.
///
/// # Examples
///
/// ```
/// use ps_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"decoder": {"idle_timeout_ms": 250}}"#).unwrap();
/// assert_eq!(config.decoder.idle_timeout_ms, 250);
/// assert_eq!(config.cli.quit_key, "Escape");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Decoder configuration.
    pub decoder: DecoderConfig,

    /// Terminal host configuration.
    pub cli: CliConfig,
}

impl Config {
    /// Loads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid JSON for this schema, or
    /// [`ConfigError::InvalidOption`] if validation fails.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decoder.validate()?;
        if self.cli.quit_key.is_empty() {
            return Err(ConfigError::invalid_option(
                "cli.quit_key",
                "must not be empty",
            ));
        }
        Ok(())
    }
}
