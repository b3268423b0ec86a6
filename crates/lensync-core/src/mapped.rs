#![forbid(unsafe_code)]

//! Derived lenses: [`Mapped`] (closure transform) and [`Typed`] (serde view).
//!
//! Both forward subscriptions to their source unchanged, so a listener on a
//! derived lens sees exactly the events a listener on the source would.

use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::lens::{Lens, LensKey};
use crate::listeners::{Listener, Subscription};
use crate::node::Node;
use crate::path::display_path;

/// A lens transformed by a pair of conversion closures.
///
/// `to` converts source values on read, `from` converts back on write.
pub struct Mapped<L: Lens, T> {
    source: L,
    to: Rc<dyn Fn(L::Value) -> T>,
    from: Rc<dyn Fn(T) -> L::Value>,
    view: TypeId,
}

impl<L: Lens, T> Clone for Mapped<L, T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            to: Rc::clone(&self.to),
            from: Rc::clone(&self.from),
            view: self.view,
        }
    }
}

impl<L: Lens, T: Clone + 'static> Mapped<L, T> {
    /// Layer `to`/`from` over `source`.
    pub fn new<To, From>(source: L, to: To, from: From) -> Self
    where
        To: Fn(L::Value) -> T + 'static,
        From: Fn(T) -> L::Value + 'static,
    {
        Self {
            source,
            to: Rc::new(to),
            from: Rc::new(from),
            view: TypeId::of::<(To, From)>(),
        }
    }

    /// The lens this one reads through.
    #[must_use]
    pub fn source(&self) -> &L {
        &self.source
    }
}

impl<L: Lens, T: Clone + 'static> Lens for Mapped<L, T> {
    type Value = T;

    fn get(&self) -> T {
        (self.to)(self.source.get())
    }

    fn set(&self, value: T) {
        self.source.set((self.from)(value));
    }

    fn subscribe_listener(&self, listener: Rc<Listener>) -> Subscription {
        self.source.subscribe_listener(listener)
    }

    fn key(&self) -> LensKey {
        self.source.key().with_view(self.view)
    }
}

impl<L: Lens, T> fmt::Debug for Mapped<L, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapped")
            .field("path", &display_path(self.source.key().path()))
            .finish()
    }
}

/// Build a [`Mapped`] lens. Free-function form of [`Lens::map`].
pub fn transform<L, T, To, From>(source: &L, to: To, from: From) -> Mapped<L, T>
where
    L: Lens,
    T: Clone + 'static,
    To: Fn(L::Value) -> T + 'static,
    From: Fn(T) -> L::Value + 'static,
{
    Mapped::new(source.clone(), to, from)
}

/// Serde-backed typed view of a [`Node`].
///
/// Reads that fail to deserialize return the last value that did (initially
/// `T::default()`); writes that fail to serialize are dropped. Both cases are
/// logged at `warn`.
pub struct Typed<T> {
    node: Node,
    last_good: Rc<RefCell<Option<T>>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Typed<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            last_good: Rc::clone(&self.last_good),
            _marker: PhantomData,
        }
    }
}

impl<T> Typed<T>
where
    T: Serialize + DeserializeOwned + Clone + Default + 'static,
{
    /// Typed view of `node`.
    #[must_use]
    pub fn new(node: Node) -> Self {
        Self {
            node,
            last_good: Rc::new(RefCell::new(None)),
            _marker: PhantomData,
        }
    }

    /// Untyped node underneath.
    #[must_use]
    pub fn node(&self) -> &Node {
        &self.node
    }
}

impl<T> Lens for Typed<T>
where
    T: Serialize + DeserializeOwned + Clone + Default + 'static,
{
    type Value = T;

    fn get(&self) -> T {
        let raw = self.node.get();
        match serde_json::from_value::<T>(raw) {
            Ok(value) => {
                *self.last_good.borrow_mut() = Some(value.clone());
                value
            }
            Err(err) => {
                tracing::warn!(
                    path = %display_path(self.node.path()),
                    error = %err,
                    "typed lens read failed; using last good value"
                );
                self.last_good.borrow().clone().unwrap_or_default()
            }
        }
    }

    fn set(&self, value: T) {
        match serde_json::to_value(&value) {
            Ok(raw) => self.node.set(raw),
            Err(err) => tracing::warn!(
                path = %display_path(self.node.path()),
                error = %err,
                "typed lens write dropped"
            ),
        }
    }

    fn subscribe_listener(&self, listener: Rc<Listener>) -> Subscription {
        self.node.subscribe_listener(listener)
    }

    fn key(&self) -> LensKey {
        self.node.key().with_view(TypeId::of::<T>())
    }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typed")
            .field("type", &std::any::type_name::<T>())
            .field("path", &display_path(self.node.path()))
            .finish()
    }
}
