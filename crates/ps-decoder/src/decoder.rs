//! The barcode input decoder.
//!
//! Keyboard-wedge scanners type their payload as a rapid burst of key
//! presses followed by `Enter`. [`BarcodeDecoder`] watches the shared key
//! stream, buffers accepted characters, and reports a [`Barcode`] when
//! `Enter` closes a buffer of a valid length.
//!
//! # State Machine
//!
//! ```text
//!            accepted key (append)
//!          ┌──────────────┐ ┌─────────┐
//!          │              ▼ │         │
//!      ┌───────┐      ┌──────────────┐│
//!  ──► │ Idle  │      │ Accumulating ├┘
//!      └───────┘      └──────┬───────┘
//!        ▲   │ Enter         │ Enter (decoded / invalid)
//!        │   └──► no-op      │ idle timeout (silent clear)
//!        └───────────────────┘
//! ```
//!
//! Every accepted key cancels the pending idle timer and schedules a new
//! one. When the timer fires, the buffer is cleared without a callback.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use ps_core::{DecoderConfig, KeyInput};
//! use ps_decoder::{attach, KeyBus, KeySource, ManualScheduler, Scheduler};
//!
//! # fn main() -> Result<(), ps_decoder::DecoderError> {
//! let bus = Arc::new(KeyBus::new());
//! let scheduler = Arc::new(ManualScheduler::new());
//! let scanned = Arc::new(Mutex::new(Vec::new()));
//!
//! let sink = Arc::clone(&scanned);
//! let handle = attach(
//!     Arc::clone(&bus) as Arc<dyn KeySource>,
//!     Arc::clone(&scheduler) as Arc<dyn Scheduler>,
//!     DecoderConfig::default(),
//!     move |barcode| sink.lock().push(barcode.into_string()),
//!     None,
//! )?;
//!
//! for c in "12345678".chars() {
//!     bus.publish(&KeyInput::from(c));
//! }
//! bus.publish(&KeyInput::enter());
//!
//! assert_eq!(*scanned.lock(), vec!["12345678".to_owned()]);
//! handle.detach();
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use ps_core::{Barcode, DecoderConfig, KeyInput};
use tracing::{debug, trace, warn};

use crate::error::DecoderError;
use crate::events::{DecodeOutcome, DecodeStats};
use crate::filter::{DigitsOnlyFilter, KeyFilter, ScannerKeyFilter};
use crate::scheduler::{CancelToken, Scheduler};
use crate::source::{KeySource, SubscriptionId};

/// Callback invoked with each decoded barcode.
pub type DecodedCallback = Box<dyn Fn(Barcode) + Send + Sync>;

/// Callback invoked when a scan ends with an invalid length.
pub type InvalidCallback = Box<dyn Fn() + Send + Sync>;

/// Mutable decoder state, guarded by one lock.
#[derive(Default)]
struct DecoderState {
    /// Characters accumulated since the last reset.
    buffer: String,

    /// Length of `buffer` in characters.
    buffer_len: usize,

    /// Token of the outstanding idle timer, if any.
    timer: Option<CancelToken>,

    /// Bumped on every rearm; a firing timer with an older value is stale.
    generation: u64,

    detached: bool,

    stats: DecodeStats,
}

impl DecoderState {
    fn take_buffer(&mut self) -> (String, usize) {
        let len = std::mem::take(&mut self.buffer_len);
        (std::mem::take(&mut self.buffer), len)
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Builder for [`BarcodeDecoder`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use ps_core::{DecoderConfig, KeyInput};
/// use ps_decoder::{BarcodeDecoder, DecodeOutcome, ManualScheduler};
///
/// # fn main() -> Result<(), ps_decoder::DecoderError> {
/// let decoder = BarcodeDecoder::builder(DecoderConfig::default())
///     .on_invalid(|| eprintln!("bad scan"))
///     .build(Arc::new(ManualScheduler::new()), |barcode| println!("{barcode}"))?;
///
/// assert_eq!(decoder.handle_event(&KeyInput::enter()), DecodeOutcome::Empty);
/// # Ok(())
/// # }
/// ```
pub struct DecoderBuilder {
    config: DecoderConfig,
    filter: Option<Box<dyn KeyFilter>>,
    on_invalid: Option<InvalidCallback>,
}

impl std::fmt::Debug for DecoderBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderBuilder")
            .field("config", &self.config)
            .field("custom_filter", &self.filter.is_some())
            .field("on_invalid", &self.on_invalid.is_some())
            .finish()
    }
}

impl DecoderBuilder {
    /// Sets the callback for scans that end with an invalid length.
    #[must_use]
    pub fn on_invalid(mut self, on_invalid: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_invalid = Some(Box::new(on_invalid));
        self
    }

    /// Sets an already boxed invalid-scan callback, or clears it.
    #[must_use]
    pub fn on_invalid_boxed(mut self, on_invalid: Option<InvalidCallback>) -> Self {
        self.on_invalid = on_invalid;
        self
    }

    /// Replaces the acceptance filter chosen from the configuration.
    #[must_use]
    pub fn filter(mut self, filter: impl KeyFilter) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Validates the configuration and creates the decoder.
    ///
    /// # Errors
    ///
    /// Returns [`DecoderError::Config`] if the configuration is invalid.
    pub fn build(
        self,
        scheduler: Arc<dyn Scheduler>,
        on_decoded: impl Fn(Barcode) + Send + Sync + 'static,
    ) -> Result<Arc<BarcodeDecoder>, DecoderError> {
        self.config.validate()?;

        let filter: Box<dyn KeyFilter> = match self.filter {
            Some(filter) => filter,
            None if self.config.digits_only => Box::new(DigitsOnlyFilter),
            None => Box::new(ScannerKeyFilter),
        };

        Ok(Arc::new_cyclic(|weak_self| BarcodeDecoder {
            state: Mutex::new(DecoderState::default()),
            config: self.config,
            filter,
            scheduler,
            on_decoded: Box::new(on_decoded),
            on_invalid: self.on_invalid,
            weak_self: Weak::clone(weak_self),
        }))
    }
}

/// Decodes scanner bursts from a key-event stream.
///
/// The decoder is always held in an [`Arc`] so idle timers can reach it
/// without keeping it alive. All state changes for one event happen under a
/// single lock; callbacks run after the lock is released, so a callback may
/// feed more events or [`detach`](Self::detach) the decoder.
pub struct BarcodeDecoder {
    state: Mutex<DecoderState>,
    config: DecoderConfig,
    filter: Box<dyn KeyFilter>,
    scheduler: Arc<dyn Scheduler>,
    on_decoded: DecodedCallback,
    on_invalid: Option<InvalidCallback>,
    weak_self: Weak<Self>,
}

impl std::fmt::Debug for BarcodeDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarcodeDecoder")
            .field("config", &self.config)
            .field("buffered_len", &self.buffered_len())
            .field("is_detached", &self.is_detached())
            .finish_non_exhaustive()
    }
}

impl BarcodeDecoder {
    /// Starts building a decoder with the given configuration.
    #[must_use]
    pub fn builder(config: DecoderConfig) -> DecoderBuilder {
        DecoderBuilder {
            config,
            filter: None,
            on_invalid: None,
        }
    }

    /// Returns the decoder configuration.
    #[must_use]
    pub const fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Processes one key event.
    ///
    /// Returns what the event did. Decoded and invalid outcomes have already
    /// been reported through the callbacks when this returns.
    pub fn handle_event(&self, key: &KeyInput) -> DecodeOutcome {
        let outcome = {
            let mut state = self.state.lock();
            let outcome = self.transition(&mut state, key);
            state.stats.record(&outcome);
            outcome
        };

        match &outcome {
            DecodeOutcome::Decoded(barcode) => (self.on_decoded)(barcode.clone()),
            DecodeOutcome::Invalid { .. } => {
                if let Some(on_invalid) = &self.on_invalid {
                    on_invalid();
                }
            }
            _ => {}
        }

        outcome
    }

    fn transition(&self, state: &mut DecoderState, key: &KeyInput) -> DecodeOutcome {
        if state.detached {
            return DecodeOutcome::Detached;
        }

        if !self.filter.accepts(key) {
            trace!(key = %key, "Ignoring key event");
            return DecodeOutcome::Ignored;
        }

        self.rearm_timer(state);

        if !key.is_terminator() {
            state.buffer.push_str(key.key());
            state.buffer_len += key.key().chars().count();
            return DecodeOutcome::Accumulated {
                len: state.buffer_len,
            };
        }

        if state.buffer_len == 0 {
            trace!("Terminator with empty buffer");
            return DecodeOutcome::Empty;
        }

        let (payload, len) = state.take_buffer();
        if self.config.is_valid_length(len) {
            debug!(len, barcode = %payload, "Decoded barcode");
            DecodeOutcome::Decoded(Barcode::new(payload))
        } else {
            warn!(
                len,
                valid_lengths = ?self.config.valid_lengths.as_slice(),
                "Discarding scan with invalid length"
            );
            DecodeOutcome::Invalid { len }
        }
    }

    /// Cancels the outstanding idle timer and schedules a fresh one.
    fn rearm_timer(&self, state: &mut DecoderState) {
        state.cancel_timer();
        state.generation += 1;

        let generation = state.generation;
        let decoder = Weak::clone(&self.weak_self);
        let token = self.scheduler.schedule_once(
            self.config.idle_timeout(),
            Box::new(move || {
                if let Some(decoder) = decoder.upgrade() {
                    decoder.expire(generation);
                }
            }),
        );
        state.timer = Some(token);
    }

    /// Idle timer body: clears the buffer unless the timer was superseded.
    fn expire(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.detached || state.generation != generation {
            trace!(generation, "Ignoring stale idle timer");
            return;
        }

        state.timer = None;
        let (_, len) = state.take_buffer();
        if len > 0 {
            state.stats.timeouts += 1;
            debug!(len, "Idle timeout discarded partial scan");
        }
    }

    /// Stops processing events and cancels the idle timer.
    ///
    /// Idempotent, and safe to call from inside a decode callback. This does
    /// not unsubscribe from a [`KeySource`]; [`DecoderHandle::detach`] does
    /// both.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        if state.detached {
            return;
        }
        state.detached = true;
        state.cancel_timer();
        state.take_buffer();
        debug!("Decoder detached");
    }

    /// Returns `true` once [`detach`](Self::detach) has been called.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    /// Returns the number of characters currently buffered.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.state.lock().buffer_len
    }

    /// Returns a snapshot of the decoder counters.
    #[must_use]
    pub fn stats(&self) -> DecodeStats {
        self.state.lock().stats
    }
}

impl Drop for BarcodeDecoder {
    fn drop(&mut self) {
        self.state.get_mut().cancel_timer();
    }
}

/// A decoder subscribed to a key source.
///
/// Dropping the handle detaches the decoder.
pub struct DecoderHandle {
    decoder: Arc<BarcodeDecoder>,
    source: Arc<dyn KeySource>,
    subscription: Mutex<Option<SubscriptionId>>,
}

impl std::fmt::Debug for DecoderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderHandle")
            .field("decoder", &self.decoder)
            .field("subscription", &*self.subscription.lock())
            .finish_non_exhaustive()
    }
}

impl DecoderHandle {
    /// Subscribes `decoder` to `source`.
    #[must_use]
    pub fn subscribe(decoder: Arc<BarcodeDecoder>, source: Arc<dyn KeySource>) -> Self {
        let weak = Arc::downgrade(&decoder);
        let id = source.subscribe(Arc::new(move |key: &KeyInput| {
            if let Some(decoder) = weak.upgrade() {
                decoder.handle_event(key);
            }
        }));
        debug!(subscription = id.get(), "Decoder attached");

        Self {
            decoder,
            source,
            subscription: Mutex::new(Some(id)),
        }
    }

    /// Returns the underlying decoder.
    #[must_use]
    pub const fn decoder(&self) -> &Arc<BarcodeDecoder> {
        &self.decoder
    }

    /// Returns `true` while the decoder is subscribed.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.subscription.lock().is_some()
    }

    /// Unsubscribes from the source and cancels the idle timer.
    ///
    /// Idempotent, and safe to call from inside a decode callback.
    pub fn detach(&self) {
        let subscription = self.subscription.lock().take();
        if let Some(id) = subscription {
            self.source.unsubscribe(id);
        }
        self.decoder.detach();
    }
}

impl Drop for DecoderHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Creates a decoder and subscribes it to `source`.
///
/// `on_decoded` receives every barcode; `on_invalid`, if given, is called
/// for every scan that ends with a length outside
/// [`DecoderConfig::valid_lengths`].
///
/// # Errors
///
/// Returns [`DecoderError::Config`] if the configuration is invalid.
pub fn attach(
    source: Arc<dyn KeySource>,
    scheduler: Arc<dyn Scheduler>,
    config: DecoderConfig,
    on_decoded: impl Fn(Barcode) + Send + Sync + 'static,
    on_invalid: Option<InvalidCallback>,
) -> Result<DecoderHandle, DecoderError> {
    let decoder = BarcodeDecoder::builder(config)
        .on_invalid_boxed(on_invalid)
        .build(scheduler, on_decoded)?;
    Ok(DecoderHandle::subscribe(decoder, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{ManualScheduler, ScheduledTask};
    use crate::source::KeyBus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;
    use std::time::Duration;

    const EAN13: &str = "4006381333931";

    /// Records every callback a decoder makes.
    #[derive(Default)]
    struct Recorder {
        decoded: Mutex<Vec<String>>,
        invalid: AtomicUsize,
    }

    impl Recorder {
        fn decoded(&self) -> Vec<String> {
            self.decoded.lock().clone()
        }

        fn invalid(&self) -> usize {
            self.invalid.load(Ordering::SeqCst)
        }
    }

    fn decoder_with(
        config: DecoderConfig,
        scheduler: Arc<dyn Scheduler>,
    ) -> (Arc<BarcodeDecoder>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let on_decoded = Arc::clone(&recorder);
        let on_invalid = Arc::clone(&recorder);
        let decoder = BarcodeDecoder::builder(config)
            .on_invalid(move || {
                on_invalid.invalid.fetch_add(1, Ordering::SeqCst);
            })
            .build(scheduler, move |barcode| {
                on_decoded.decoded.lock().push(barcode.into_string());
            })
            .unwrap();
        (decoder, recorder)
    }

    fn manual_decoder() -> (Arc<BarcodeDecoder>, Arc<Recorder>, Arc<ManualScheduler>) {
        let scheduler = Arc::new(ManualScheduler::new());
        let (decoder, recorder) = decoder_with(DecoderConfig::default(), Arc::clone(&scheduler) as _);
        (decoder, recorder, scheduler)
    }

    fn type_str(decoder: &BarcodeDecoder, text: &str) {
        for c in text.chars() {
            decoder.handle_event(&KeyInput::from(c));
        }
    }

    fn digits(len: usize) -> String {
        (0..len).map(|i| char::from(b'0' + (i % 10) as u8)).collect()
    }

    #[test]
    fn test_decodes_ean8() {
        let (decoder, recorder, _) = manual_decoder();
        for key in ["1", "2", "3", "4", "5", "6", "7", "8"] {
            decoder.handle_event(&KeyInput::new(key));
        }
        let outcome = decoder.handle_event(&KeyInput::enter());

        assert_eq!(outcome, DecodeOutcome::Decoded(Barcode::new("12345678")));
        assert_eq!(recorder.decoded(), vec!["12345678"]);
        assert_eq!(recorder.invalid(), 0);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_decodes_ean13_without_padding() {
        let (decoder, recorder, _) = manual_decoder();
        type_str(&decoder, EAN13);
        decoder.handle_event(&KeyInput::enter());

        assert_eq!(recorder.decoded(), vec![EAN13]);
        assert_eq!(recorder.decoded()[0].len(), 13);
    }

    #[test]
    fn test_short_scan_reports_invalid() {
        let (decoder, recorder, _) = manual_decoder();
        type_str(&decoder, "123");
        let outcome = decoder.handle_event(&KeyInput::enter());

        assert_eq!(outcome, DecodeOutcome::Invalid { len: 3 });
        assert_eq!(recorder.invalid(), 1);
        assert!(recorder.decoded().is_empty());
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_enter_on_empty_buffer_is_noop() {
        let (decoder, recorder, scheduler) = manual_decoder();
        assert_eq!(decoder.handle_event(&KeyInput::enter()), DecodeOutcome::Empty);
        assert!(recorder.decoded().is_empty());
        assert_eq!(recorder.invalid(), 0);
        // The terminator is still an accepted key and rearms the timer.
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_every_length_followed_by_enter() {
        for len in 0..=20 {
            let (decoder, recorder, _) = manual_decoder();
            let payload = digits(len);
            type_str(&decoder, &payload);
            decoder.handle_event(&KeyInput::enter());

            match len {
                0 => {
                    assert!(recorder.decoded().is_empty());
                    assert_eq!(recorder.invalid(), 0);
                }
                8 | 13 => {
                    assert_eq!(recorder.decoded(), vec![payload]);
                    assert_eq!(recorder.invalid(), 0);
                }
                _ => {
                    assert!(recorder.decoded().is_empty(), "len {len} decoded");
                    assert_eq!(recorder.invalid(), 1, "len {len}");
                }
            }
            assert_eq!(decoder.buffered_len(), 0);
        }
    }

    #[test]
    fn test_idle_timeout_clears_buffer() {
        let (decoder, recorder, scheduler) = manual_decoder();
        type_str(&decoder, "123");
        assert_eq!(decoder.buffered_len(), 3);

        scheduler.advance(Duration::from_millis(1001));
        assert_eq!(decoder.buffered_len(), 0);

        assert_eq!(decoder.handle_event(&KeyInput::enter()), DecodeOutcome::Empty);
        assert!(recorder.decoded().is_empty());
        assert_eq!(recorder.invalid(), 0);
        assert_eq!(decoder.stats().timeouts, 1);
    }

    #[test]
    fn test_each_key_rearms_timer() {
        let (decoder, recorder, scheduler) = manual_decoder();
        for c in "12345678".chars() {
            decoder.handle_event(&KeyInput::from(c));
            scheduler.advance(Duration::from_millis(900));
            assert_eq!(scheduler.pending(), 1);
        }
        decoder.handle_event(&KeyInput::enter());
        assert_eq!(recorder.decoded(), vec!["12345678"]);
    }

    #[test]
    fn test_timeout_then_fresh_scan() {
        let (decoder, recorder, scheduler) = manual_decoder();
        type_str(&decoder, "99");
        scheduler.advance(Duration::from_secs(2));

        type_str(&decoder, "87654321");
        decoder.handle_event(&KeyInput::enter());
        assert_eq!(recorder.decoded(), vec!["87654321"]);
    }

    #[test]
    fn test_ignored_keys_do_not_change_result() {
        let (decoder, recorder, scheduler) = manual_decoder();
        let keys = ["Shift", "1", "2", "Control", "3", "4", "5", "ArrowLeft", "6", "7", "8", "Alt"];
        for key in keys {
            decoder.handle_event(&KeyInput::new(key));
        }
        decoder.handle_event(&KeyInput::enter());

        assert_eq!(recorder.decoded(), vec!["12345678"]);
        assert_eq!(decoder.stats().ignored, 4);
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_ignored_key_does_not_rearm_timer() {
        let (decoder, _, scheduler) = manual_decoder();
        type_str(&decoder, "12");
        scheduler.advance(Duration::from_millis(600));
        assert_eq!(decoder.handle_event(&KeyInput::new("Shift")), DecodeOutcome::Ignored);
        scheduler.advance(Duration::from_millis(500));
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_letters_are_accumulated_by_default() {
        let (decoder, recorder, _) = manual_decoder();
        type_str(&decoder, "1234a678");
        decoder.handle_event(&KeyInput::enter());
        assert_eq!(recorder.decoded(), vec!["1234a678"]);
    }

    #[test]
    fn test_digits_only_rejects_letters() {
        let scheduler = Arc::new(ManualScheduler::new());
        let (decoder, recorder) =
            decoder_with(DecoderConfig::default().digits_only(), scheduler);
        type_str(&decoder, "1234a5678");
        decoder.handle_event(&KeyInput::enter());
        assert_eq!(recorder.decoded(), vec!["12345678"]);
    }

    #[test]
    fn test_custom_valid_lengths() {
        let scheduler = Arc::new(ManualScheduler::new());
        let config = DecoderConfig {
            valid_lengths: [12].into_iter().collect(),
            ..DecoderConfig::default()
        };
        let (decoder, recorder) = decoder_with(config, scheduler);

        type_str(&decoder, "036000291452");
        decoder.handle_event(&KeyInput::enter());
        type_str(&decoder, "12345678");
        decoder.handle_event(&KeyInput::enter());

        assert_eq!(recorder.decoded(), vec!["036000291452"]);
        assert_eq!(recorder.invalid(), 1);
    }

    #[test]
    fn test_at_most_one_pending_timer() {
        let (decoder, _, scheduler) = manual_decoder();
        type_str(&decoder, "123456");
        assert_eq!(scheduler.pending(), 1);
        decoder.handle_event(&KeyInput::enter());
        assert_eq!(scheduler.pending(), 1);
    }

    /// Hands out tasks without honouring cancellation, so a test can fire
    /// a superseded timer on purpose.
    #[derive(Default)]
    struct CapturingScheduler {
        tasks: Mutex<Vec<ScheduledTask>>,
    }

    impl Scheduler for CapturingScheduler {
        fn schedule_once(&self, _delay: Duration, task: ScheduledTask) -> CancelToken {
            self.tasks.lock().push(task);
            CancelToken::new()
        }
    }

    #[test]
    fn test_stale_timer_does_not_clear_new_buffer() {
        let scheduler = Arc::new(CapturingScheduler::default());
        let (decoder, _) = decoder_with(DecoderConfig::default(), Arc::clone(&scheduler) as _);

        type_str(&decoder, "12");
        let mut tasks = std::mem::take(&mut *scheduler.tasks.lock());
        assert_eq!(tasks.len(), 2);

        // The first timer was superseded by the second key.
        let first = tasks.remove(0);
        first();
        assert_eq!(decoder.buffered_len(), 2);

        let second = tasks.remove(0);
        second();
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_buffer_cleared_before_callback() {
        let scheduler = Arc::new(ManualScheduler::new());
        let slot: Arc<OnceLock<Weak<BarcodeDecoder>>> = Arc::new(OnceLock::new());
        let observed = Arc::new(Mutex::new(None));

        let cb_slot = Arc::clone(&slot);
        let cb_observed = Arc::clone(&observed);
        let decoder = BarcodeDecoder::builder(DecoderConfig::default())
            .build(scheduler, move |_barcode| {
                if let Some(decoder) = cb_slot.get().and_then(Weak::upgrade) {
                    *cb_observed.lock() = Some(decoder.buffered_len());
                    // Feeding a key from inside the callback must not deadlock.
                    decoder.handle_event(&KeyInput::from('9'));
                }
            })
            .unwrap();
        slot.set(Arc::downgrade(&decoder)).unwrap();

        type_str(&decoder, "12345678");
        decoder.handle_event(&KeyInput::enter());

        assert_eq!(*observed.lock(), Some(0));
        assert_eq!(decoder.buffered_len(), 1);
    }

    #[test]
    fn test_detach_stops_processing() {
        let (decoder, recorder, scheduler) = manual_decoder();
        type_str(&decoder, "1234");
        decoder.detach();
        decoder.detach();

        assert!(decoder.is_detached());
        assert_eq!(decoder.buffered_len(), 0);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(decoder.handle_event(&KeyInput::from('5')), DecodeOutcome::Detached);
        assert_eq!(decoder.handle_event(&KeyInput::enter()), DecodeOutcome::Detached);
        assert!(recorder.decoded().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = BarcodeDecoder::builder(DecoderConfig::default().with_idle_timeout_ms(0))
            .build(Arc::new(ManualScheduler::new()), |_| {});
        assert!(matches!(result, Err(DecoderError::Config(_))));
    }

    #[test]
    fn test_attach_receives_bus_events() {
        let bus = Arc::new(KeyBus::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let recorder = Arc::new(Recorder::default());
        let sink = Arc::clone(&recorder);

        let handle = attach(
            Arc::clone(&bus) as _,
            Arc::clone(&scheduler) as _,
            DecoderConfig::default(),
            move |barcode| sink.decoded.lock().push(barcode.into_string()),
            None,
        )
        .unwrap();
        assert!(handle.is_attached());
        assert_eq!(bus.listener_count(), 1);

        for c in EAN13.chars() {
            bus.publish(&KeyInput::from(c));
        }
        bus.publish(&KeyInput::enter());
        assert_eq!(recorder.decoded(), vec![EAN13]);

        // Invalid scan without an invalid callback is still safe.
        for c in "123".chars() {
            bus.publish(&KeyInput::from(c));
        }
        bus.publish(&KeyInput::enter());
        assert_eq!(handle.decoder().stats().invalid, 1);

        handle.detach();
        assert!(!handle.is_attached());
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_drop_handle_detaches() {
        let bus = Arc::new(KeyBus::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let handle = attach(
            Arc::clone(&bus) as _,
            Arc::clone(&scheduler) as _,
            DecoderConfig::default(),
            |_| {},
            None,
        )
        .unwrap();
        bus.publish(&KeyInput::from('1'));
        assert_eq!(scheduler.pending(), 1);

        drop(handle);
        assert_eq!(bus.listener_count(), 0);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_detach_from_inside_callback() {
        let bus = Arc::new(KeyBus::new());
        let scheduler = Arc::new(ManualScheduler::new());
        let slot: Arc<OnceLock<DecoderHandle>> = Arc::new(OnceLock::new());
        let decoded = Arc::new(AtomicUsize::new(0));

        let cb_slot = Arc::clone(&slot);
        let cb_decoded = Arc::clone(&decoded);
        let handle = attach(
            Arc::clone(&bus) as _,
            Arc::clone(&scheduler) as _,
            DecoderConfig::default(),
            move |_barcode| {
                cb_decoded.fetch_add(1, Ordering::SeqCst);
                if let Some(handle) = cb_slot.get() {
                    handle.detach();
                }
            },
            None,
        )
        .unwrap();
        assert!(slot.set(handle).is_ok());

        for _ in 0..2 {
            for c in "12345678".chars() {
                bus.publish(&KeyInput::from(c));
            }
            bus.publish(&KeyInput::enter());
        }

        assert_eq!(decoded.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
        assert!(slot.get().is_some_and(|h| !h.is_attached()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_idle_timeout() {
        let scheduler = Arc::new(crate::scheduler::TokioScheduler::current().unwrap());
        let (decoder, recorder) = decoder_with(DecoderConfig::default(), scheduler);

        type_str(&decoder, "123");
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(decoder.buffered_len(), 0);

        decoder.handle_event(&KeyInput::enter());
        assert!(recorder.decoded().is_empty());
        assert_eq!(recorder.invalid(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_fast_scan_decodes() {
        let scheduler = Arc::new(crate::scheduler::TokioScheduler::current().unwrap());
        let (decoder, recorder) = decoder_with(DecoderConfig::default(), scheduler);

        for c in EAN13.chars() {
            decoder.handle_event(&KeyInput::from(c));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        decoder.handle_event(&KeyInput::enter());
        assert_eq!(recorder.decoded(), vec![EAN13]);
    }
}
