#![forbid(unsafe_code)]

//! Local stores: lenses whose backing value is owned by the store itself.
//!
//! A [`Store<T>`] keeps its value in a private tree, so it speaks exactly the
//! same notification protocol as any other lens. Child nodes obtained through
//! [`Store::go`] notify store-level listeners and vice versa.
//!
//! [`DerivedStore<T>`] adds a seed: [`sync`](DerivedStore::sync) re-seeds the
//! value only when the seed itself changes, so local edits survive unrelated
//! re-renders.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lensync_core::{Lens, LensKey, Listener, Node, PathSegment, Subscription, Typed};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Bounds for values a store can hold.
pub trait StoreValue: Serialize + DeserializeOwned + Clone + Default + 'static {}

impl<T> StoreValue for T where T: Serialize + DeserializeOwned + Clone + Default + 'static {}

/// Owned lens over a value of type `T`.
///
/// Cloning yields another handle onto the same store.
pub struct Store<T> {
    view: Typed<T>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            view: self.view.clone(),
        }
    }
}

impl<T: StoreValue> Store<T> {
    /// New store holding `initial`.
    ///
    /// A value that fails to serialize leaves the store holding `null`,
    /// which reads back as `T::default()`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        let root = Node::from_serialize(&initial).unwrap_or_else(|err| {
            tracing::warn!(
                error = %err,
                ty = std::any::type_name::<T>(),
                "store seed failed to serialize"
            );
            Node::new(Value::Null)
        });
        Self { view: root.typed() }
    }

    /// Untyped root node of the store's tree.
    #[must_use]
    pub fn node(&self) -> &Node {
        self.view.node()
    }

    /// Untyped child node at `segment`.
    #[must_use]
    pub fn go(&self, segment: impl Into<PathSegment>) -> Node {
        self.node().go(segment)
    }

    /// Replace the value. Listeners fire only if it differs.
    pub fn reseed(&self, value: T) {
        self.view.set(value);
    }

    /// Number of live listeners on the store's tree.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.node().listener_count()
    }
}

impl<T: StoreValue> Lens for Store<T> {
    type Value = T;

    fn get(&self) -> T {
        self.view.get()
    }

    fn set(&self, value: T) {
        self.view.set(value);
    }

    fn subscribe_listener(&self, listener: Rc<Listener>) -> Subscription {
        self.view.subscribe_listener(listener)
    }

    fn key(&self) -> LensKey {
        self.view.key()
    }
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

/// Create a store holding `initial`.
#[must_use]
pub fn create_store<T: StoreValue>(initial: T) -> Store<T> {
    Store::new(initial)
}

/// Store re-seeded whenever its seed changes.
pub struct DerivedStore<T> {
    store: Store<T>,
    seed: Rc<RefCell<T>>,
}

impl<T> Clone for DerivedStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            seed: Rc::clone(&self.seed),
        }
    }
}

impl<T: StoreValue + PartialEq> DerivedStore<T> {
    /// Store seeded with `seed`.
    #[must_use]
    pub fn new(seed: T) -> Self {
        Self {
            store: Store::new(seed.clone()),
            seed: Rc::new(RefCell::new(seed)),
        }
    }

    /// Re-seed if `seed` differs from the last one. Returns `true` if it did.
    pub fn sync(&self, seed: T) -> bool {
        if *self.seed.borrow() == seed {
            return false;
        }
        *self.seed.borrow_mut() = seed.clone();
        tracing::debug!(ty = std::any::type_name::<T>(), "derived store reseeded");
        self.store.reseed(seed);
        true
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Store<T> {
        &self.store
    }

    /// Last seed applied.
    #[must_use]
    pub fn seed(&self) -> T {
        self.seed.borrow().clone()
    }
}

impl<T: StoreValue + PartialEq> Lens for DerivedStore<T> {
    type Value = T;

    fn get(&self) -> T {
        self.store.get()
    }

    fn set(&self, value: T) {
        self.store.set(value);
    }

    fn subscribe_listener(&self, listener: Rc<Listener>) -> Subscription {
        self.store.subscribe_listener(listener)
    }

    fn key(&self) -> LensKey {
        self.store.key()
    }
}

impl<T> fmt::Debug for DerivedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedStore")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::cell::Cell;

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Form {
        name: String,
        age: u32,
    }

    #[test]
    fn store_reads_and_writes() {
        let store = create_store(Form {
            name: "a".into(),
            age: 1,
        });
        assert_eq!(store.get().name, "a");
        store.update(|mut f| {
            f.age += 1;
            f
        });
        assert_eq!(store.get().age, 2);
    }

    #[test]
    fn child_writes_notify_store_listeners() {
        let store = create_store(Form::default());
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = store.subscribe(move |e| {
            assert!(!e.is_current());
            h.set(h.get() + 1);
        });
        store.go("name").set(json!("typed"));
        assert_eq!(hits.get(), 1);
        assert_eq!(store.get().name, "typed");
    }

    #[test]
    fn equal_reseed_is_silent() {
        let store = create_store(7_u32);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = store.subscribe(move |_| h.set(h.get() + 1));
        store.reseed(7);
        assert_eq!(hits.get(), 0);
        store.reseed(8);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn clones_share_identity() {
        let a = create_store(0_i32);
        let b = a.clone();
        b.set(5);
        assert_eq!(a.get(), 5);
        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), create_store(0_i32).key());
    }

    #[test]
    fn derived_store_keeps_local_edits_until_seed_changes() {
        let derived = DerivedStore::new(String::from("seed"));
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = derived.subscribe(move |_| h.set(h.get() + 1));

        derived.set("edited".into());
        assert!(!derived.sync("seed".into()));
        assert_eq!(derived.get(), "edited");

        assert!(derived.sync("fresh".into()));
        assert_eq!(derived.get(), "fresh");
        assert_eq!(derived.seed(), "fresh");
        assert_eq!(hits.get(), 2, "subscription survives the reseed");
    }
}
