//! Key-event sources.
//!
//! A [`KeySource`] is whatever delivers key presses to the decoder: a
//! terminal reader, a GUI toolkit's keyboard hook, or a scripted replay.
//! The decoder subscribes on attach and unsubscribes on detach.
//!
//! [`KeyBus`] is the in-process implementation. Hosts push events into it
//! with [`KeyBus::publish`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ps_core::KeyInput;
use rustc_hash::FxHashMap;
use tracing::trace;

/// A subscriber callback receiving key events.
pub type KeyListener = Arc<dyn Fn(&KeyInput) + Send + Sync>;

/// Identifies one subscription on a [`KeySource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// A stream of key events that listeners can subscribe to.
pub trait KeySource: Send + Sync {
    /// Registers a listener and returns its subscription id.
    fn subscribe(&self, listener: KeyListener) -> SubscriptionId;

    /// Removes a listener. Returns `false` if the id was not subscribed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

/// An in-process broadcast source.
///
/// Listeners are called in subscription order. The registry lock is not
/// held while listeners run, so a listener may unsubscribe itself or
/// publish further events.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use ps_core::KeyInput;
/// use ps_decoder::{KeyBus, KeySource};
///
/// let bus = KeyBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// let id = bus.subscribe(Arc::new(move |_key: &KeyInput| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// }));
///
/// bus.publish(&KeyInput::from('1'));
/// assert!(bus.unsubscribe(id));
/// bus.publish(&KeyInput::from('2'));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct KeyBus {
    listeners: Mutex<FxHashMap<SubscriptionId, KeyListener>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for KeyBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBus")
            .field("listeners", &self.listener_count())
            .finish_non_exhaustive()
    }
}

impl KeyBus {
    /// Creates a bus with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `key` to every current listener.
    ///
    /// Returns the number of listeners called.
    pub fn publish(&self, key: &KeyInput) -> usize {
        let mut snapshot: Vec<(SubscriptionId, KeyListener)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();
        snapshot.sort_unstable_by_key(|(id, _)| *id);

        trace!(key = %key, listeners = snapshot.len(), "Publishing key event");
        for (_, listener) in &snapshot {
            listener(key);
        }
        snapshot.len()
    }

    /// Returns the number of subscribed listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl KeySource for KeyBus {
    fn subscribe(&self, listener: KeyListener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }
}
