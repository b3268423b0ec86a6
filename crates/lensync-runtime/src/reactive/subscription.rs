#![forbid(unsafe_code)]

//! Subscription management: attaching listeners to lenses for a scoped
//! lifetime.
//!
//! - [`subscribe`] attaches a raw callback that receives the event and the
//!   lens it was registered on.
//! - [`subscribe_matching`] attaches the effective listener of a binding: on
//!   a matching event it re-reads the lens and hands the value on.
//! - [`SubscriptionScope`] groups guards so they detach together.
//! - [`Attachment`] keeps one live group per declared dependency set and
//!   re-attaches when the dependencies change.
//!
//! # Invariants
//!
//! 1. Each guard detaches exactly the listener it attached.
//! 2. A scope releases its guards in reverse registration order.
//! 3. An `Attachment` releases the old group before attaching the new one;
//!    the two are never live together.
//! 4. The matching listener forwards the lens's value at delivery time, never
//!    a value captured earlier.

use std::fmt;
use std::rc::Rc;

use lensync_core::{ChangeEvent, Lens, Subscription};

use super::trigger::Triggers;

/// Raw listener receiving the event and the lens it is attached to.
pub type Callback<L> = Rc<dyn Fn(&ChangeEvent, &L)>;

/// Wrap a closure as a [`Callback`].
pub fn callback<L: Lens>(f: impl Fn(&ChangeEvent, &L) + 'static) -> Callback<L> {
    Rc::new(f)
}

/// Attach `f` to `lens`. Dropping the guard detaches it.
pub fn subscribe<L: Lens>(lens: &L, f: impl Fn(&ChangeEvent, &L) + 'static) -> Subscription {
    let target = lens.clone();
    lens.subscribe(move |event| f(event, &target))
}

/// Attach every callback in `callbacks` independently; they detach together.
pub fn subscribe_all<L: Lens>(
    lens: &L,
    callbacks: impl IntoIterator<Item = Callback<L>>,
) -> SubscriptionScope {
    let mut scope = SubscriptionScope::new();
    for cb in callbacks {
        scope.subscribe(lens, move |event, target| cb(event, target));
    }
    scope
}

/// Attach a listener that, when `triggers` match, re-reads `lens` and passes
/// the value to `on_match`.
pub fn subscribe_matching<L: Lens>(
    lens: &L,
    triggers: Triggers,
    on_match: impl Fn(L::Value) + 'static,
) -> Subscription {
    let target = lens.clone();
    lens.subscribe(move |event| {
        if triggers.matches(event) {
            on_match(target.get());
        }
    })
}

// ---------------------------------------------------------------------------
// SubscriptionScope: lifecycle management
// ---------------------------------------------------------------------------

/// Collects subscriptions for a logical scope (e.g., a view).
///
/// When the scope is dropped, all held subscriptions are released.
///
/// # Invariants
///
/// 1. Subscriptions are released in reverse registration order.
/// 2. After drop or `clear()`, no callback from this scope fires.
/// 3. The scope is reusable after `clear()`.
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold an existing guard until the scope is released.
    pub fn hold(&mut self, sub: Subscription) {
        self.subscriptions.push(sub);
    }

    /// Subscribe a raw callback within this scope.
    ///
    /// Returns the scope for chaining.
    pub fn subscribe<L: Lens>(
        &mut self,
        lens: &L,
        f: impl Fn(&ChangeEvent, &L) + 'static,
    ) -> &mut Self {
        self.subscriptions.push(subscribe(lens, f));
        self
    }

    /// Subscribe a matching listener within this scope.
    pub fn subscribe_matching<L: Lens>(
        &mut self,
        lens: &L,
        triggers: Triggers,
        on_match: impl Fn(L::Value) + 'static,
    ) -> &mut Self {
        self.subscriptions
            .push(subscribe_matching(lens, triggers, on_match));
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release everything now; the scope stays usable.
    pub fn clear(&mut self) {
        while let Some(sub) = self.subscriptions.pop() {
            drop(sub);
        }
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Attachment: re-subscription on dependency change
// ---------------------------------------------------------------------------

/// One live subscription group bound to a dependency value.
///
/// [`ensure`](Self::ensure) keeps the current group while the dependencies
/// compare equal, and tears it down before attaching a fresh one when they
/// do not.
pub struct Attachment<D> {
    deps: Option<D>,
    scope: SubscriptionScope,
}

impl<D: PartialEq> Attachment<D> {
    /// An attachment with nothing attached yet.
    #[must_use]
    pub fn new() -> Self {
        Self {
            deps: None,
            scope: SubscriptionScope::new(),
        }
    }

    /// Make sure the group for `deps` is attached. Returns `true` when
    /// `attach` ran.
    pub fn ensure(&mut self, deps: D, attach: impl FnOnce(&mut SubscriptionScope)) -> bool {
        if self.deps.as_ref() == Some(&deps) {
            return false;
        }
        self.scope.clear();
        self.deps = None;
        attach(&mut self.scope);
        self.deps = Some(deps);
        tracing::debug!(listeners = self.scope.len(), "attachment renewed");
        true
    }

    /// Detach the current group.
    pub fn release(&mut self) {
        self.scope.clear();
        self.deps = None;
    }

    /// Whether a group is attached.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.deps.is_some()
    }

    /// Number of listeners in the current group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.scope.len()
    }

    /// Whether the current group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scope.is_empty()
    }
}

impl<D: PartialEq> Default for Attachment<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D> fmt::Debug for Attachment<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("attached", &self.deps.is_some())
            .field("listeners", &self.scope.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::trigger::Directive;
    use lensync_core::Node;
    use serde_json::{Value, json};
    use std::cell::{Cell, RefCell};

    fn tree() -> Node {
        Node::new(json!({ "name": "a", "multi": { "path": { "strict": "s" } } }))
    }

    #[test]
    fn subscribe_receives_event_and_lens() {
        let root = tree();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = subscribe(&root.go("name"), move |_, node| {
            s.borrow_mut().push(node.get());
        });
        root.go("name").set(json!("b"));
        assert_eq!(*seen.borrow(), vec![json!("b")]);
    }

    #[test]
    fn unsubscribe_silences_listener() {
        let root = tree();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = subscribe(&root, move |_, _| h.set(h.get() + 1));
        root.go("name").set(json!("b"));
        sub.unsubscribe();
        root.go("name").set(json!("c"));
        assert_eq!(hits.get(), 1);
        assert_eq!(root.listener_count(), 0);
    }

    #[test]
    fn subscribe_all_detaches_together() {
        let root = tree();
        let hits = Rc::new(Cell::new(0));
        let callbacks: Vec<Callback<Node>> = (0..3)
            .map(|_| {
                let h = Rc::clone(&hits);
                callback(move |_, _: &Node| h.set(h.get() + 1))
            })
            .collect();
        let scope = subscribe_all(&root, callbacks);
        assert_eq!(scope.len(), 3);
        root.set(json!(1));
        assert_eq!(hits.get(), 3);
        drop(scope);
        root.set(json!(2));
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn matching_listener_forwards_fresh_value() {
        let root = tree();
        let name = root.go("name");
        let seen: Rc<RefCell<Vec<Value>>> = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = subscribe_matching(&name, Directive::Strict.into(), move |v| {
            s.borrow_mut().push(v);
        });
        root.set(json!({ "name": "z" }));
        assert!(seen.borrow().is_empty(), "ancestor write is not strict");
        name.set(json!("y"));
        assert_eq!(*seen.borrow(), vec![json!("y")]);
    }

    #[test]
    fn scope_release_order_and_reuse() {
        let root = tree();
        let mut scope = SubscriptionScope::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        scope.subscribe(&root, move |_, _| h.set(h.get() + 1));
        scope.clear();
        assert!(scope.is_empty());
        root.set(json!(0));
        assert_eq!(hits.get(), 0);

        let h = Rc::clone(&hits);
        scope.subscribe(&root, move |_, _| h.set(h.get() + 1));
        root.set(json!(1));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn scope_hold_external_subscription() {
        let root = tree();
        let mut scope = SubscriptionScope::new();
        scope.hold(root.subscribe(|_| {}));
        assert_eq!(root.listener_count(), 1);
        drop(scope);
        assert_eq!(root.listener_count(), 0);
    }

    #[test]
    fn attachment_keeps_group_while_deps_equal() {
        let root = tree();
        let mut att = Attachment::new();
        let attach = |scope: &mut SubscriptionScope| {
            scope.hold(root.subscribe(|_| {}));
        };
        assert!(att.ensure(root.key(), attach));
        assert!(!att.ensure(root.key(), attach));
        assert_eq!(root.listener_count(), 1);
    }

    #[test]
    fn attachment_renews_on_dep_change() {
        let root = tree();
        let mut att = Attachment::new();
        let a = root.go("name");
        let b = root.go("multi");
        att.ensure(a.key(), |scope| scope.hold(a.subscribe(|_| {})));
        att.ensure(b.key(), |scope| {
            // Old group is already gone when the new one attaches.
            assert_eq!(root.listener_count(), 0);
            scope.hold(b.subscribe(|_| {}));
        });
        assert_eq!(root.listener_count(), 1);
        att.release();
        assert!(!att.is_attached());
        assert_eq!(root.listener_count(), 0);
    }

    #[test]
    fn scope_debug_format() {
        let root = tree();
        let mut scope = SubscriptionScope::new();
        scope.subscribe(&root, |_, _| {});
        scope.subscribe(&root, |_, _| {});
        let debug = format!("{scope:?}");
        assert!(debug.contains("subscriptions: 2"));
    }
}
