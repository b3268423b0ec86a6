#![forbid(unsafe_code)]

//! View bindings: a read/write pair over a lens that tells its owner when to
//! re-render.
//!
//! A [`LensBinding<L>`] subscribes to a lens with a set of [`Triggers`]. When
//! a matching event arrives it records the change and calls the owner's
//! invalidation hook; the owner re-reads through [`LensBinding::get`].
//!
//! # Usage
//!
//! ```ignore
//! let root = Node::new(json!({ "name": "a" }));
//! let binding = LensBinding::new(&root.go("name"), Directive::Strict, || request_redraw());
//!
//! binding.set(json!("b"));           // writes through the lens
//! assert_eq!(binding.get(), json!("b"));
//! ```
//!
//! # Debounced Bindings
//!
//! [`LensBinding::debounced`] routes matching notifications through a read
//! [`Debounce`] and local writes through a separate write `Debounce`. A local
//! write updates the locally observed value immediately, so a controlled text
//! field keeps showing what was typed while the lens write is still pending.
//!
//! # Invariants
//!
//! 1. An undebounced binding always reads the lens's current value.
//! 2. A debounced binding reads the last value it observed or wrote locally.
//! 3. The listener holds the binding weakly; dropping every handle detaches it.
//! 4. A binding without a lens installs no listener, reads `None`, and
//!    ignores writes.
//! 5. A pending debounced write is never discarded: detaching or dropping the
//!    binding commits it at once, and [`Scope`](super::scope::Scope) hands it
//!    to the replacement binding when only the triggers or timeout changed.
//!
//! # Failure Modes
//!
//! - Invalidation hook panics: propagates into the writer's `set` call.
//! - Lens dropped elsewhere while the binding lives: the binding's clone keeps
//!   the storage alive.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use lensync_core::{Lens, Subscription, display_path};

use super::debounce::{Debounce, Timeout};
use super::trigger::Triggers;
use crate::timer::Scheduler;

/// Hook called when a binding's observed value changes.
pub type Invalidate = Rc<dyn Fn()>;

struct Coalescers {
    read: Debounce,
    write: Debounce,
    timeout: Timeout,
}

struct BindingInner<L: Lens> {
    lens: Option<L>,
    triggers: Triggers,
    local: RefCell<Option<L::Value>>,
    version: Cell<u64>,
    invalidate: Invalidate,
    coalescers: Option<Coalescers>,
    pending: RefCell<Option<L::Value>>,
    subscription: RefCell<Option<Subscription>>,
}

impl<L: Lens> BindingInner<L> {
    fn observe(&self, value: L::Value) {
        *self.local.borrow_mut() = Some(value);
        self.version.set(self.version.get() + 1);
        (self.invalidate)();
    }

    fn refresh(&self) {
        if let Some(lens) = &self.lens {
            self.observe(lens.get());
        }
    }

    fn on_match(self: &Rc<Self>) {
        match &self.coalescers {
            None => self.refresh(),
            Some(coalescers) => {
                let weak = Rc::downgrade(self);
                coalescers.read.run(
                    move || {
                        if let Some(inner) = weak.upgrade() {
                            inner.refresh();
                        }
                    },
                    coalescers.timeout.read,
                );
            }
        }
    }

    fn write(self: &Rc<Self>, value: L::Value) {
        let Some(lens) = &self.lens else {
            tracing::trace!("write to unbound binding ignored");
            return;
        };
        match &self.coalescers {
            None => lens.set(value),
            Some(_) => {
                self.observe(value.clone());
                self.schedule_write(value);
            }
        }
    }

    fn schedule_write(self: &Rc<Self>, value: L::Value) {
        let Some(coalescers) = &self.coalescers else {
            return;
        };
        *self.pending.borrow_mut() = Some(value);
        let weak = Rc::downgrade(self);
        coalescers.write.run(
            move || {
                if let Some(inner) = weak.upgrade() {
                    inner.commit();
                }
            },
            coalescers.timeout.write,
        );
    }

    fn commit(&self) {
        let value = self.pending.borrow_mut().take();
        if let (Some(value), Some(lens)) = (value, &self.lens) {
            lens.set(value);
        }
    }

    fn take_pending(&self) -> Option<L::Value> {
        if let Some(coalescers) = &self.coalescers {
            coalescers.write.cancel();
        }
        self.pending.borrow_mut().take()
    }

    fn read(&self) -> Option<L::Value> {
        let lens = self.lens.as_ref()?;
        if self.coalescers.is_some() {
            self.local.borrow().clone()
        } else {
            Some(lens.get())
        }
    }
}

impl<L: Lens> Drop for BindingInner<L> {
    fn drop(&mut self) {
        if let Some(value) = self.take_pending() {
            tracing::debug!("binding dropped with pending write; committing");
            if let Some(lens) = &self.lens {
                lens.set(value);
            }
        }
    }
}

/// Read/write binding over a lens.
///
/// Cloning yields another handle onto the same binding.
pub struct LensBinding<L: Lens> {
    inner: Rc<BindingInner<L>>,
}

impl<L: Lens> Clone for LensBinding<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<L: Lens> LensBinding<L> {
    fn build(
        lens: Option<L>,
        triggers: Triggers,
        coalescers: Option<Coalescers>,
        invalidate: Invalidate,
    ) -> Self {
        let initial = lens.as_ref().map(Lens::get);
        let inner = Rc::new(BindingInner {
            lens,
            triggers,
            local: RefCell::new(initial),
            version: Cell::new(0),
            invalidate,
            coalescers,
            pending: RefCell::new(None),
            subscription: RefCell::new(None),
        });
        if let Some(lens) = &inner.lens {
            let weak: Weak<BindingInner<L>> = Rc::downgrade(&inner);
            let sub = lens.subscribe(move |event| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if inner.triggers.matches(event) {
                    inner.on_match();
                }
            });
            tracing::debug!(path = %display_path(lens.key().path()), "binding attached");
            *inner.subscription.borrow_mut() = Some(sub);
        }
        Self { inner }
    }

    /// Bind `lens`, calling `invalidate` whenever `triggers` match.
    pub fn new(lens: &L, triggers: impl Into<Triggers>, invalidate: impl Fn() + 'static) -> Self {
        Self::build(
            Some(lens.clone()),
            triggers.into(),
            None,
            Rc::new(invalidate),
        )
    }

    /// Bind `lens` if present, otherwise produce an inert binding.
    pub fn from_option(
        lens: Option<&L>,
        triggers: impl Into<Triggers>,
        invalidate: impl Fn() + 'static,
    ) -> Self {
        Self::build(lens.cloned(), triggers.into(), None, Rc::new(invalidate))
    }

    /// Bind `lens` with debounced reads and writes on `scheduler`.
    pub fn debounced(
        lens: Option<&L>,
        timeout: impl Into<Timeout>,
        triggers: impl Into<Triggers>,
        scheduler: Rc<dyn Scheduler>,
        invalidate: impl Fn() + 'static,
    ) -> Self {
        let timeout = timeout.into();
        let coalescers = Coalescers {
            read: Debounce::new(Rc::clone(&scheduler), timeout.read),
            write: Debounce::new(scheduler, timeout.write),
            timeout,
        };
        Self::build(
            lens.cloned(),
            triggers.into(),
            Some(coalescers),
            Rc::new(invalidate),
        )
    }

    /// A binding with no lens: reads `None`, ignores writes.
    #[must_use]
    pub fn detached() -> Self {
        Self::build(None, Triggers::default(), None, Rc::new(|| {}))
    }

    /// Current value, or `None` without a lens.
    #[must_use]
    pub fn value(&self) -> Option<L::Value> {
        self.inner.read()
    }

    /// Current value, or the default without a lens.
    #[must_use]
    pub fn get(&self) -> L::Value
    where
        L::Value: Default,
    {
        self.value().unwrap_or_default()
    }

    /// Write `value` through the binding.
    pub fn set(&self, value: L::Value) {
        self.inner.write(value);
    }

    /// Derive the next value from the current one. No-op without a lens.
    pub fn update(&self, f: impl FnOnce(L::Value) -> L::Value) {
        if let Some(prev) = self.value() {
            self.set(f(prev));
        }
    }

    /// Cloneable write handle.
    #[must_use]
    pub fn setter(&self) -> Setter<L> {
        Setter {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Number of matching notifications observed plus local debounced writes.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// The bound lens.
    #[must_use]
    pub fn lens(&self) -> Option<&L> {
        self.inner.lens.as_ref()
    }

    /// Match declarations in effect.
    #[must_use]
    pub fn triggers(&self) -> &Triggers {
        &self.inner.triggers
    }

    /// Debounce delays, if debounced.
    #[must_use]
    pub fn timeout(&self) -> Option<Timeout> {
        self.inner.coalescers.as_ref().map(|c| c.timeout)
    }

    /// Whether a debounced write is waiting to be committed.
    #[must_use]
    pub fn has_pending_write(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    /// Commit a pending debounced write now instead of after the quiet period.
    pub fn flush(&self) {
        if let Some(value) = self.inner.take_pending()
            && let Some(lens) = &self.inner.lens
        {
            lens.set(value);
        }
    }

    /// Remove the pending debounced write without committing it.
    pub(crate) fn take_pending_write(&self) -> Option<L::Value> {
        self.inner.take_pending()
    }

    /// Continue a write taken from `previous` with [`take_pending_write`].
    ///
    /// A debounced binding over the same lens echoes it locally without
    /// invalidating and restarts the write delay. Otherwise the value is
    /// committed to the lens it was written through.
    ///
    /// [`take_pending_write`]: Self::take_pending_write
    pub(crate) fn carry_write(&self, previous: &Self, value: L::Value) {
        let same_lens = self.lens().map(Lens::key) == previous.lens().map(Lens::key);
        if same_lens && self.inner.coalescers.is_some() {
            *self.inner.local.borrow_mut() = Some(value.clone());
            self.inner.schedule_write(value);
        } else if let Some(lens) = previous.lens() {
            lens.set(value);
        }
    }

    /// Whether the listener is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner
            .subscription
            .borrow()
            .as_ref()
            .is_some_and(Subscription::is_active)
    }

    /// Detach the listener, cancel a pending debounced read and commit a
    /// pending debounced write.
    pub fn detach(&self) {
        if let Some(sub) = self.inner.subscription.borrow_mut().take() {
            sub.unsubscribe();
            tracing::debug!("binding detached");
        }
        if let Some(coalescers) = &self.inner.coalescers {
            coalescers.read.cancel();
        }
        self.flush();
    }
}

impl<L: Lens> fmt::Debug for LensBinding<L>
where
    L::Value: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LensBinding")
            .field("value", &self.value())
            .field("version", &self.version())
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Write half of a [`LensBinding`], cheap to clone into event handlers.
pub struct Setter<L: Lens> {
    inner: Rc<BindingInner<L>>,
}

impl<L: Lens> Clone for Setter<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<L: Lens> Setter<L> {
    /// Write `value`.
    pub fn set(&self, value: L::Value) {
        self.inner.write(value);
    }

    /// Derive the next value from the current one.
    pub fn update(&self, f: impl FnOnce(L::Value) -> L::Value) {
        if let Some(prev) = self.inner.read() {
            self.inner.write(f(prev));
        }
    }
}

impl<L: Lens> fmt::Debug for Setter<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter").finish()
    }
}
