//! Error types for the ps-decoder crate.
//!
//! Event processing never fails: ignored keys, empty terminators and invalid
//! lengths are outcomes, not errors. [`DecoderError`] only covers setting a
//! decoder up.

use ps_core::ConfigError;

/// Errors that can occur while creating or attaching a decoder.
///
/// # Examples
///
/// ```
/// use ps_core::DecoderConfig;
/// use ps_decoder::DecoderError;
///
/// let err = DecoderConfig::default()
///     .with_idle_timeout_ms(0)
///     .validate()
///     .map_err(DecoderError::from)
///     .unwrap_err();
/// assert!(err.is_fatal());
/// ```
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecoderError {
    /// The decoder configuration failed validation.
    #[error("invalid decoder configuration: {0}")]
    Config(#[from] ConfigError),

    /// A Tokio scheduler was requested outside a Tokio runtime.
    #[error("no Tokio runtime available for idle timers: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl DecoderError {
    /// Returns `true` if this error is recoverable.
    ///
    /// No setup failure can be retried without changing the configuration
    /// or the runtime, so this is currently always `false`.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Runtime(_) => false,
        }
    }

    /// Returns `true` if this error is fatal (the decoder cannot be used).
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = DecoderError::from(ConfigError::invalid_option(
            "idle_timeout_ms",
            "must be greater than zero",
        ));
        assert!(err.is_fatal());
        assert!(err.to_string().starts_with("invalid decoder configuration"));
        assert!(err.to_string().contains("idle_timeout_ms"));
    }

    #[test]
    fn test_runtime_error_outside_tokio() {
        let err = DecoderError::from(tokio::runtime::Handle::try_current().unwrap_err());
        assert!(matches!(err, DecoderError::Runtime(_)));
        assert!(!err.is_recoverable());
    }
}
