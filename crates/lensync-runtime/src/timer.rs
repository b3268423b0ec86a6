#![forbid(unsafe_code)]

//! Cooperative timers for debounced reads and writes.
//!
//! The runtime never spawns threads. Delayed work is handed to a
//! [`Scheduler`]; the host event loop decides when it runs. [`TimerQueue`] is
//! the bundled implementation: a deadline-ordered queue drained explicitly by
//! the host, either against a manual clock ([`TimerQueue::advance`]) or
//! against wall time ([`TimerQueue::run_due`]).
//!
//! # Invariants
//!
//! 1. Tasks run in deadline order; equal deadlines run in scheduling order.
//! 2. A task scheduled while the queue is draining runs in the same drain if
//!    its deadline falls inside the drained window.
//! 3. No queue borrow is held while a task runs, so tasks may schedule more
//!    work.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

/// Sink for delayed single-shot tasks.
pub trait Scheduler {
    /// Run `task` once, no earlier than `delay` from now.
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>);
}

thread_local! {
    static GLOBAL_TIMERS: TimerQueue = TimerQueue::realtime();
}

enum Clock {
    Manual(Cell<Duration>),
    Realtime(Instant),
}

type Task = Box<dyn FnOnce()>;

struct TimerInner {
    clock: Clock,
    timers: RefCell<BTreeMap<(Duration, u64), Task>>,
    next_seq: Cell<u64>,
}

/// Deadline-ordered queue of delayed tasks.
///
/// Cloning yields another handle onto the same queue.
#[derive(Clone)]
pub struct TimerQueue {
    inner: Rc<TimerInner>,
}

impl TimerQueue {
    fn with_clock(clock: Clock) -> Self {
        Self {
            inner: Rc::new(TimerInner {
                clock,
                timers: RefCell::new(BTreeMap::new()),
                next_seq: Cell::new(0),
            }),
        }
    }

    /// Queue driven by an explicit clock that only moves on [`advance`](Self::advance).
    #[must_use]
    pub fn manual() -> Self {
        Self::with_clock(Clock::Manual(Cell::new(Duration::ZERO)))
    }

    /// Queue measured against wall time since creation.
    #[must_use]
    pub fn realtime() -> Self {
        Self::with_clock(Clock::Realtime(Instant::now()))
    }

    /// The thread-local default queue (realtime).
    #[must_use]
    pub fn global() -> Self {
        GLOBAL_TIMERS.with(Clone::clone)
    }

    /// Current time on this queue's clock, relative to its creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        match &self.inner.clock {
            Clock::Manual(now) => now.get(),
            Clock::Realtime(origin) => origin.elapsed(),
        }
    }

    /// Whether the clock only moves on `advance`.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self.inner.clock, Clock::Manual(_))
    }

    /// Number of tasks waiting to run.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Deadline of the earliest waiting task.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .timers
            .borrow()
            .first_key_value()
            .map(|(&(deadline, _), _)| deadline)
    }

    /// Time until the earliest waiting task is due (zero if already due).
    #[must_use]
    pub fn time_to_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_sub(self.now()))
    }

    /// Move a manual clock forward by `by`, running every task that falls due
    /// on the way. Returns the number of tasks run.
    ///
    /// On a realtime queue the clock cannot be moved; this behaves like
    /// [`run_due`](Self::run_due).
    pub fn advance(&self, by: Duration) -> usize {
        let Clock::Manual(now) = &self.inner.clock else {
            return self.run_due();
        };
        let target = now.get() + by;
        let ran = self.drain_until(target);
        now.set(target);
        ran
    }

    /// Run every task whose deadline has passed. Returns the number run.
    pub fn run_due(&self) -> usize {
        self.drain_until(self.now())
    }

    /// Drop every waiting task without running it.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.inner.timers.borrow_mut());
        tracing::debug!(count = dropped.len(), "timer queue cleared");
    }

    fn drain_until(&self, limit: Duration) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut timers = self.inner.timers.borrow_mut();
                match timers.first_key_value() {
                    Some((&(deadline, _), _)) if deadline <= limit => timers.pop_first(),
                    _ => None,
                }
            };
            let Some(((deadline, _), task)) = next else {
                break;
            };
            if let Clock::Manual(now) = &self.inner.clock {
                now.set(deadline);
            }
            task();
            ran += 1;
        }
        ran
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) {
        let deadline = self.now() + delay;
        let seq = self.inner.next_seq.get();
        self.inner.next_seq.set(seq + 1);
        self.inner.timers.borrow_mut().insert((deadline, seq), task);
        tracing::trace!(?deadline, seq, "timer scheduled");
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("manual", &self.is_manual())
            .field("now", &self.now())
            .field("pending", &self.pending())
            .finish()
    }
}
