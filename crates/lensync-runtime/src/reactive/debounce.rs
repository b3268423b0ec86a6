#![forbid(unsafe_code)]

//! Debounce coalescer: keep only the last of a burst of calls.
//!
//! Each [`Debounce::run`] bumps a sequence stamp and schedules its task on a
//! [`Scheduler`]. When the timer fires, the task runs only if the stamp it
//! captured is still current, i.e. no later `run` (or `cancel`) superseded it.
//! That gives "last call after a quiet period" semantics, not fixed-rate
//! throttling.
//!
//! # Invariants
//!
//! 1. `run(task, Duration::ZERO)` runs `task` before returning and registers
//!    no timer. It still supersedes pending tasks.
//! 2. `cancel()` makes every pending task inert; tasks that already ran are
//!    unaffected.
//! 3. Scheduled callbacks hold the state weakly: once every `Debounce` handle
//!    is dropped, pending tasks are inert.
//! 4. Read and write paths use separate instances, so their quiet periods
//!    never interfere.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::timer::{Scheduler, TimerQueue};

/// Read/write delay pair for debounced bindings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Timeout {
    /// Delay between a matching notification and the local re-read.
    pub read: Duration,
    /// Delay between a local write and the commit to the lens.
    pub write: Duration,
}

impl Timeout {
    /// Same delay for reads and writes.
    #[must_use]
    pub const fn uniform(delay: Duration) -> Self {
        Self {
            read: delay,
            write: delay,
        }
    }

    /// Independent read and write delays.
    #[must_use]
    pub const fn split(read: Duration, write: Duration) -> Self {
        Self { read, write }
    }
}

impl From<Duration> for Timeout {
    fn from(delay: Duration) -> Self {
        Self::uniform(delay)
    }
}

/// Milliseconds, applied to both reads and writes.
impl From<u64> for Timeout {
    fn from(millis: u64) -> Self {
        Self::uniform(Duration::from_millis(millis))
    }
}

impl From<(Duration, Duration)> for Timeout {
    fn from((read, write): (Duration, Duration)) -> Self {
        Self::split(read, write)
    }
}

/// `(read, write)` in milliseconds.
impl From<(u64, u64)> for Timeout {
    fn from((read, write): (u64, u64)) -> Self {
        Self::split(Duration::from_millis(read), Duration::from_millis(write))
    }
}

#[derive(Default)]
struct DebounceState {
    stamp: Cell<u64>,
    pending: Cell<Option<u64>>,
    executed: Cell<u64>,
}

impl DebounceState {
    fn bump(&self) -> u64 {
        let stamp = self.stamp.get() + 1;
        self.stamp.set(stamp);
        stamp
    }

    fn fire(&self, stamp: u64, task: impl FnOnce()) {
        if self.stamp.get() != stamp {
            tracing::trace!(stamp, current = self.stamp.get(), "debounced task superseded");
            return;
        }
        self.pending.set(None);
        self.executed.set(self.executed.get() + 1);
        task();
    }
}

/// Last-call-wins coalescer over a [`Scheduler`].
///
/// Cloning yields another handle onto the same stamp.
#[derive(Clone)]
pub struct Debounce {
    state: Rc<DebounceState>,
    scheduler: Rc<dyn Scheduler>,
    default_delay: Duration,
}

impl Debounce {
    /// Coalescer on `scheduler` with a default delay for [`run_default`](Self::run_default).
    pub fn new(scheduler: Rc<dyn Scheduler>, default_delay: Duration) -> Self {
        Self {
            state: Rc::new(DebounceState::default()),
            scheduler,
            default_delay,
        }
    }

    /// Coalescer on the thread-local [`TimerQueue`].
    #[must_use]
    pub fn on_global(default_delay: Duration) -> Self {
        Self::new(Rc::new(TimerQueue::global()), default_delay)
    }

    /// Schedule `task` after `delay`, superseding any pending task.
    pub fn run(&self, task: impl FnOnce() + 'static, delay: Duration) {
        let stamp = self.state.bump();
        if delay.is_zero() {
            self.state.fire(stamp, task);
            return;
        }
        self.state.pending.set(Some(stamp));
        let state: Weak<DebounceState> = Rc::downgrade(&self.state);
        self.scheduler.schedule(
            delay,
            Box::new(move || {
                if let Some(state) = state.upgrade() {
                    state.fire(stamp, task);
                }
            }),
        );
    }

    /// [`run`](Self::run) with the default delay.
    pub fn run_default(&self, task: impl FnOnce() + 'static) {
        self.run(task, self.default_delay);
    }

    /// Make any pending task inert.
    pub fn cancel(&self) {
        if self.state.pending.take().is_some() {
            tracing::trace!(stamp = self.state.stamp.get(), "debounce cancelled");
        }
        self.state.bump();
    }

    /// Whether a scheduled task is still waiting to run.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.pending.get().is_some()
    }

    /// Current sequence stamp.
    #[must_use]
    pub fn stamp(&self) -> u64 {
        self.state.stamp.get()
    }

    /// Number of tasks that actually ran.
    #[must_use]
    pub fn executed(&self) -> u64 {
        self.state.executed.get()
    }

    /// Delay used by [`run_default`](Self::run_default).
    #[must_use]
    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }
}

impl fmt::Debug for Debounce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debounce")
            .field("stamp", &self.stamp())
            .field("pending", &self.is_pending())
            .field("default_delay", &self.default_delay)
            .finish()
    }
}
