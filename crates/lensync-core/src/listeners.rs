#![forbid(unsafe_code)]

//! Listener registry and the RAII [`Subscription`] guard.
//!
//! The registry stores listeners as `Weak` callbacks keyed by the path they
//! were registered at. The strong reference lives in the [`Subscription`]
//! returned to the caller, so dropping the guard is enough to silence the
//! listener; the dead entry is pruned on the next delivery or removed eagerly
//! by [`Subscription::unsubscribe`].
//!
//! # Invariants
//!
//! 1. Listeners are delivered in registration order.
//! 2. A delivery snapshot is taken before any callback runs: listeners added
//!    during delivery are not invoked for that write.
//! 3. A listener detached during delivery is skipped if not yet reached.
//! 4. Removing an id that is already gone is a no-op.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::event::ChangeEvent;
use crate::path::{Path, PathSegment, is_prefix};

/// Callback invoked with each relevant [`ChangeEvent`].
pub type Listener = dyn Fn(&ChangeEvent);

struct Entry {
    id: u64,
    path: Path,
    callback: Weak<Listener>,
}

/// Path-indexed set of weak listeners shared by every lens over one tree.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: RefCell<Vec<Entry>>,
    next_id: Cell<u64>,
}

impl ListenerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` at `path` and return a guard owning it.
    pub fn attach(self: &Rc<Self>, path: Path, callback: Rc<Listener>) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            path,
            callback: Rc::downgrade(&callback),
        });
        tracing::trace!(id, "listener attached");
        Subscription {
            inner: Some(SubscriptionInner {
                registry: Rc::downgrade(self),
                id,
                _callback: callback,
            }),
        }
    }

    /// Remove the entry with `id`. Returns whether it was present.
    pub fn detach(&self, id: u64) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if removed {
            tracing::trace!(id, "listener detached");
        }
        removed
    }

    /// Snapshot the live listeners related to a write at `origin`.
    ///
    /// A listener is related when its path is a prefix of `origin` or
    /// `origin` is a prefix of its path. Dead entries are pruned.
    #[must_use]
    pub fn related(&self, origin: &[PathSegment]) -> Vec<(Path, Weak<Listener>)> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|entry| entry.callback.strong_count() > 0);
        entries
            .iter()
            .filter(|entry| is_prefix(&entry.path, origin) || is_prefix(origin, &entry.path))
            .map(|entry| (entry.path.clone(), Weak::clone(&entry.callback)))
            .collect()
    }

    /// Number of live listeners across all paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.callback.strong_count() > 0)
            .count()
    }

    /// Whether no live listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live listeners registered exactly at `path`.
    #[must_use]
    pub fn len_at(&self, path: &[PathSegment]) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.path == path && entry.callback.strong_count() > 0)
            .count()
    }
}

impl fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

struct SubscriptionInner {
    registry: Weak<ListenerRegistry>,
    id: u64,
    _callback: Rc<Listener>,
}

/// RAII guard for an attached listener.
///
/// Dropping the guard detaches the listener. [`Subscription::unsubscribe`]
/// consumes the guard, so a listener can only be detached once.
#[must_use = "dropping a Subscription detaches its listener"]
pub struct Subscription {
    inner: Option<SubscriptionInner>,
}

impl Subscription {
    /// A guard that owns nothing. Used where no lens is available.
    pub fn inert() -> Self {
        Self { inner: None }
    }

    /// Detach the listener now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    /// Whether this guard still owns an attached listener.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner
            .as_ref()
            .is_some_and(|inner| inner.registry.strong_count() > 0)
    }

    fn release(&mut self) {
        if let Some(inner) = self.inner.take()
            && let Some(registry) = inner.registry.upgrade()
        {
            registry.detach(inner.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.inner.as_ref().map(|inner| inner.id))
            .field("active", &self.is_active())
            .finish()
    }
}
