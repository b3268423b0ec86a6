#![forbid(unsafe_code)]

//! Chained lenses: a derived lens built from a source lens by a factory.
//!
//! [`chain`] applies the factory once. [`ChainCache`] remembers the result
//! per source identity, factory type and caller-supplied dependency value, so
//! repeated renders get the same derived lens, and with it the same identity
//! for downstream subscriptions.
//!
//! # Invariants
//!
//! A factory's captured state is invisible to the cache. Whatever the factory
//! captures that changes the derived lens must be passed as `deps`.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;

use ahash::{AHashMap, RandomState};
use lensync_core::{Lens, LensKey};

/// Derive a lens from `lens` with `factory`.
pub fn chain<L, D>(lens: &L, factory: impl FnOnce(&L) -> D) -> D
where
    L: Lens,
    D: Lens,
{
    factory(lens)
}

type ChainKey = (LensKey, TypeId, u64);

struct ChainEntry {
    deps: Box<dyn Any>,
    derived: Box<dyn Any>,
}

/// Cache of derived lenses keyed by source identity, factory type and deps.
#[derive(Default)]
pub struct ChainCache {
    entries: RefCell<AHashMap<ChainKey, ChainEntry>>,
    hasher: RandomState,
}

impl ChainCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached lens for `(lens, F, deps)`, deriving it on first use.
    ///
    /// Closures have distinct types, so each factory closure written in the
    /// source gets its own entry. One closure expression that captures
    /// different values yields different factories of the same type; `deps`
    /// tells them apart. Pass `()` for a factory that captures nothing.
    pub fn get_or_derive<L, K, D, F>(&self, lens: &L, deps: K, factory: F) -> D
    where
        L: Lens,
        K: Hash + Eq + 'static,
        D: Lens,
        F: FnOnce(&L) -> D + 'static,
    {
        let key = (lens.key(), TypeId::of::<F>(), self.hasher.hash_one(&deps));
        if let Some(derived) = self.entries.borrow().get(&key).and_then(|entry| {
            let same = entry.deps.downcast_ref::<K>() == Some(&deps);
            entry.derived.downcast_ref::<D>().filter(|_| same)
        }) {
            return derived.clone();
        }
        let derived = factory(lens);
        tracing::trace!(
            path = %lensync_core::display_path(key.0.path()),
            "chain derived"
        );
        self.entries.borrow_mut().insert(
            key,
            ChainEntry {
                deps: Box::new(deps),
                derived: Box::new(derived.clone()),
            },
        );
        derived
    }

    /// Drop every entry derived from `source`.
    pub fn invalidate(&self, source: &LensKey) {
        self.entries.borrow_mut().retain(|(key, _, _), _| key != source);
    }

    /// Number of cached lenses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every cached lens.
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl fmt::Debug for ChainCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensync_core::{Mapped, Node};
    use serde_json::{Value, json};
    use std::cell::Cell;
    use std::rc::Rc;

    fn upper(node: &Node) -> Mapped<Node, String> {
        node.map(
            |v: Value| v.as_str().unwrap_or_default().to_uppercase(),
            |s: String| Value::String(s.to_lowercase()),
        )
    }

    #[test]
    fn chain_applies_factory() {
        let root = Node::new(json!({ "name": "abc" }));
        let derived = chain(&root.go("name"), upper);
        assert_eq!(derived.get(), "ABC");
        derived.set("XYZ".into());
        assert_eq!(root.go("name").get(), json!("xyz"));
    }

    #[test]
    fn cache_returns_same_lens_for_same_pair() {
        let root = Node::new(json!({ "name": "abc" }));
        let cache = ChainCache::new();
        let calls = Rc::new(Cell::new(0));
        let derive = |calls: Rc<Cell<u32>>| {
            move |n: &Node| {
                calls.set(calls.get() + 1);
                upper(n)
            }
        };
        let a = cache.get_or_derive(&root.go("name"), (), derive(Rc::clone(&calls)));
        let b = cache.get_or_derive(&root.go("name"), (), derive(Rc::clone(&calls)));
        assert_eq!(calls.get(), 1);
        assert_eq!(a.key(), b.key());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn different_source_derives_again() {
        let root = Node::new(json!({ "a": "x", "b": "y" }));
        let cache = ChainCache::new();
        let a = cache.get_or_derive(&root.go("a"), (), upper);
        let b = cache.get_or_derive(&root.go("b"), (), upper);
        assert_eq!((a.get().as_str(), b.get().as_str()), ("X", "Y"));
        assert_eq!(cache.len(), 2);
        cache.invalidate(&root.go("a").key());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn captured_state_is_told_apart_by_deps() {
        let root = Node::new(json!({ "a": "A", "b": "B" }));
        let cache = ChainCache::new();
        let field = |name: &'static str| move |n: &Node| n.go(name);
        let a = cache.get_or_derive(&root, "a", field("a"));
        let b = cache.get_or_derive(&root, "b", field("b"));
        assert_eq!(a.get(), json!("A"));
        assert_eq!(b.get(), json!("B"));
        assert_eq!(cache.len(), 2);

        let again = cache.get_or_derive(&root, "a", field("a"));
        assert_eq!(again.key(), a.key());
        assert_eq!(cache.len(), 2);
    }
}
