#![forbid(unsafe_code)]

//! The [`Lens`] trait: the read/write/subscribe surface every lens exposes.
//!
//! Implementations in this crate are [`Node`](crate::Node) (a handle into a
//! shared JSON tree), [`Mapped`](crate::Mapped) (a transform over another
//! lens) and [`Typed`](crate::Typed) (a serde-backed view of a node).
//!
//! # Identity
//!
//! Lenses are cheap handles and are cloned freely, so pointer identity of the
//! handle means nothing. [`LensKey`] captures what does: the backing storage,
//! the path into it, and the view types layered on top. Two handles with equal
//! keys read and write the same value.

use std::any::TypeId;
use std::rc::Rc;

use crate::event::ChangeEvent;
use crate::listeners::{Listener, Subscription};
use crate::mapped::Mapped;
use crate::path::Path;

/// Identity of a lens: storage, path, and view.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LensKey {
    storage: usize,
    path: Path,
    views: Vec<TypeId>,
}

impl LensKey {
    /// Key for a path into storage identified by `storage`.
    #[must_use]
    pub fn new(storage: usize, path: Path) -> Self {
        Self {
            storage,
            path,
            views: Vec::new(),
        }
    }

    /// Derive the key of a view layered over this lens.
    #[must_use]
    pub fn with_view(mut self, view: TypeId) -> Self {
        self.views.push(view);
        self
    }

    /// Path component of the key.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Stable address for an `Rc` allocation, usable as a storage identity.
#[must_use]
pub fn storage_id<T: ?Sized>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc).cast::<()>() as usize
}

/// Addressable read/write handle onto a value in shared storage.
///
/// `set` delivers notifications synchronously: every related listener has
/// run by the time it returns.
pub trait Lens: Clone + 'static {
    /// Value type read and written through this lens.
    type Value: Clone + 'static;

    /// Read the current value.
    fn get(&self) -> Self::Value;

    /// Write a new value and notify related listeners.
    fn set(&self, value: Self::Value);

    /// Attach a shared listener callback.
    fn subscribe_listener(&self, listener: Rc<Listener>) -> Subscription;

    /// Identity of the storage location this lens addresses.
    fn key(&self) -> LensKey;

    /// Attach a listener closure.
    fn subscribe(&self, listener: impl Fn(&ChangeEvent) + 'static) -> Subscription {
        self.subscribe_listener(Rc::new(listener))
    }

    /// Derive the next value from the current one.
    fn update(&self, f: impl FnOnce(Self::Value) -> Self::Value) {
        self.set(f(self.get()));
    }

    /// Layer a transform over this lens.
    fn map<T, To, From>(&self, to: To, from: From) -> Mapped<Self, T>
    where
        T: Clone + 'static,
        To: Fn(Self::Value) -> T + 'static,
        From: Fn(T) -> Self::Value + 'static,
    {
        Mapped::new(self.clone(), to, from)
    }
}
