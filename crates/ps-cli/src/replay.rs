//! Scripted key replay under a virtual clock.
//!
//! A replay script is a list of tokens:
//!
//! - `+<ms>` advances the virtual clock, e.g. `+1500`
//! - `text:<chars>` types each character in turn, e.g. `text:4006381333931`
//! - anything else is a single key name, e.g. `7`, `Enter`, `Shift`
//!
//! ```text
//! pos-scan replay text:12345678 Enter text:123 +1200 Enter
//! ```

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::eyre;
use parking_lot::Mutex;
use ps_core::{DecoderConfig, KeyInput};
use ps_decoder::{attach, DecodeStats, KeyBus, KeySource, ManualScheduler, Scheduler};
use tracing::debug;

/// Prefix that types a run of characters.
const TEXT_PREFIX: &str = "text:";

/// One step of a replay script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayStep {
    /// Press a key.
    Key(KeyInput),
    /// Let virtual time pass.
    Wait(Duration),
}

/// Something the decoder reported during a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayEvent {
    /// A barcode decoded successfully.
    Decoded(String),
    /// A scan ended with an invalid length.
    Invalid,
}

/// Result of a replay run.
#[derive(Debug, Clone)]
pub struct ReplayReport {
    /// Decoder callbacks, in order.
    pub events: Vec<ReplayEvent>,
    /// Final decoder counters.
    pub stats: DecodeStats,
}

/// Parses replay tokens into steps.
///
/// # Errors
///
/// Returns an error for an empty token, an empty `text:` run, or a `+`
/// token that is not a whole number of milliseconds.
pub fn parse_script<S: AsRef<str>>(tokens: &[S]) -> color_eyre::Result<Vec<ReplayStep>> {
    let mut steps = Vec::with_capacity(tokens.len());

    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() {
            return Err(eyre!("empty replay token"));
        }

        if let Some(ms) = token.strip_prefix('+') {
            let ms: u64 = ms
                .parse()
                .map_err(|e| eyre!("invalid wait '{token}': {e}"))?;
            steps.push(ReplayStep::Wait(Duration::from_millis(ms)));
        } else if let Some(text) = token.strip_prefix(TEXT_PREFIX) {
            if text.is_empty() {
                return Err(eyre!("'{TEXT_PREFIX}' must be followed by characters"));
            }
            steps.extend(text.chars().map(|c| ReplayStep::Key(KeyInput::from(c))));
        } else {
            steps.push(ReplayStep::Key(KeyInput::new(token)));
        }
    }

    Ok(steps)
}

/// Runs `steps` through a decoder on a virtual clock.
///
/// `key_interval` is added to the clock after every key press, modelling
/// the typing speed of the scanner or person.
///
/// # Errors
///
/// Returns an error if the decoder configuration is invalid.
pub fn run(
    config: &DecoderConfig,
    steps: &[ReplayStep],
    key_interval: Duration,
) -> color_eyre::Result<ReplayReport> {
    let bus = Arc::new(KeyBus::new());
    let scheduler = Arc::new(ManualScheduler::new());
    let events = Arc::new(Mutex::new(Vec::new()));

    let decoded_sink = Arc::clone(&events);
    let invalid_sink = Arc::clone(&events);
    let handle = attach(
        Arc::clone(&bus) as Arc<dyn KeySource>,
        Arc::clone(&scheduler) as Arc<dyn Scheduler>,
        config.clone(),
        move |barcode| {
            decoded_sink
                .lock()
                .push(ReplayEvent::Decoded(barcode.into_string()));
        },
        Some(Box::new(move || invalid_sink.lock().push(ReplayEvent::Invalid))),
    )?;

    for step in steps {
        match step {
            ReplayStep::Key(key) => {
                bus.publish(key);
                scheduler.advance(key_interval);
            }
            ReplayStep::Wait(duration) => {
                let fired = scheduler.advance(*duration);
                debug!(wait_ms = duration.as_millis(), fired, "Advanced virtual clock");
            }
        }
    }

    let stats = handle.decoder().stats();
    handle.detach();

    let events = std::mem::take(&mut *events.lock());
    Ok(ReplayReport { events, stats })
}
