//! One-shot delayed task scheduling.
//!
//! The decoder never touches a clock directly. It asks a [`Scheduler`] to
//! run a task after a delay and keeps the returned [`CancelToken`] so the
//! task can be cancelled when the next key arrives.
//!
//! - [`TokioScheduler`] runs tasks on a Tokio runtime with real time.
//! - [`ManualScheduler`] keeps a virtual clock that only moves when told to,
//!   for tests and scripted replay.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::time::Duration;
//! use ps_decoder::{ManualScheduler, Scheduler};
//!
//! let scheduler = ManualScheduler::new();
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = Arc::clone(&fired);
//!
//! scheduler.schedule_once(
//!     Duration::from_millis(100),
//!     Box::new(move || flag.store(true, Ordering::SeqCst)),
//! );
//!
//! scheduler.advance(Duration::from_millis(99));
//! assert!(!fired.load(Ordering::SeqCst));
//! scheduler.advance(Duration::from_millis(1));
//! assert!(fired.load(Ordering::SeqCst));
//! ```

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::DecoderError;

/// A task run once by a [`Scheduler`].
pub type ScheduledTask = Box<dyn FnOnce() + Send + 'static>;

/// Handle for cancelling a scheduled task.
///
/// Cancelling is idempotent. A task whose token is cancelled before its
/// delay elapses never runs.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    token: CancellationToken,
}

impl CancelToken {
    /// Creates a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the associated task.
    #[inline]
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` if [`cancel`](Self::cancel) has been called.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A facility for running a task once after a delay.
///
/// Implementations must be [`Send`] and [`Sync`]; tasks may run on any
/// thread, so they are `Send` as well.
pub trait Scheduler: Send + Sync {
    /// Schedules `task` to run once after `delay`.
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> CancelToken;
}

/// Runs scheduled tasks on a Tokio runtime.
///
/// Each task is a spawned future racing `tokio::time::sleep` against its
/// cancellation token.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Creates a scheduler that spawns onto the given runtime.
    #[must_use]
    pub const fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Creates a scheduler for the runtime the caller is running in.
    ///
    /// # Errors
    ///
    /// Returns [`DecoderError::Runtime`] when called outside a Tokio runtime.
    pub fn current() -> Result<Self, DecoderError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> CancelToken {
        let token = CancelToken::new();
        let cancelled = token.token.clone();

        self.handle.spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {
                    trace!("Scheduled task cancelled");
                }
                () = tokio::time::sleep(delay) => {
                    if !cancelled.is_cancelled() {
                        task();
                    }
                }
            }
        });

        token
    }
}

struct PendingTask {
    due: Duration,
    seq: u64,
    token: CancelToken,
    task: ScheduledTask,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    queue: Vec<PendingTask>,
}

impl ManualClock {
    /// Removes the earliest task due at or before `deadline`.
    fn pop_due(&mut self, deadline: Duration) -> Option<PendingTask> {
        self.queue.retain(|pending| !pending.token.is_cancelled());
        let index = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, pending)| pending.due <= deadline)
            .min_by_key(|(_, pending)| (pending.due, pending.seq))
            .map(|(index, _)| index)?;
        Some(self.queue.swap_remove(index))
    }
}

/// A scheduler driven by a virtual clock.
///
/// Time starts at zero and only moves on [`advance`](Self::advance). Due
/// tasks run in due-time order on the calling thread, outside the internal
/// lock, so a task may schedule further tasks.
#[derive(Default)]
pub struct ManualScheduler {
    clock: Mutex<ManualClock>,
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let clock = self.clock.lock();
        f.debug_struct("ManualScheduler")
            .field("now", &clock.now)
            .field("queued", &clock.queue.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Creates a scheduler with the clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    /// Returns the number of queued tasks that have not been cancelled.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.clock
            .lock()
            .queue
            .iter()
            .filter(|pending| !pending.token.is_cancelled())
            .count()
    }

    /// Moves the clock forward by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let deadline = self.clock.lock().now + by;
        let mut ran = 0;

        loop {
            let next = {
                let mut clock = self.clock.lock();
                let next = clock.pop_due(deadline);
                if let Some(pending) = &next {
                    clock.now = pending.due;
                }
                next
            };
            let Some(pending) = next else { break };

            trace!(due_ms = pending.due.as_millis(), "Running scheduled task");
            (pending.task)();
            ran += 1;
        }

        self.clock.lock().now = deadline;
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: ScheduledTask) -> CancelToken {
        let token = CancelToken::new();
        let mut clock = self.clock.lock();
        let due = clock.now + delay;
        let seq = clock.next_seq;
        clock.next_seq += 1;
        clock.queue.push(PendingTask {
            due,
            seq,
            token: token.clone(),
            task,
        });
        token
    }
}
