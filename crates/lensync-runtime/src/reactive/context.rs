#![forbid(unsafe_code)]

//! Lens context: a lens made available to a subtree without threading it
//! through every constructor.
//!
//! A [`LensContext<L>`] holds an optional base lens and a stack of scoped
//! overrides. [`provide`](LensContext::provide) pushes an override and
//! returns a guard that pops it on drop, so nested providers shadow outer
//! ones for exactly their own extent.
//!
//! # Failure Modes
//!
//! Guards dropped out of order log a warning. Each guard removes only its own
//! override, so the remaining ones stay in push order.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use lensync_core::Lens;

/// Shared slot for a contextual lens.
///
/// Cloning yields another handle onto the same context.
pub struct LensContext<L: Lens> {
    base: Rc<RefCell<Option<L>>>,
    overrides: Rc<RefCell<Overrides<L>>>,
}

struct Overrides<L> {
    next_id: u64,
    entries: Vec<(u64, L)>,
}

impl<L: Lens> Clone for LensContext<L> {
    fn clone(&self) -> Self {
        Self {
            base: Rc::clone(&self.base),
            overrides: Rc::clone(&self.overrides),
        }
    }
}

impl<L: Lens> Default for LensContext<L> {
    fn default() -> Self {
        Self {
            base: Rc::new(RefCell::new(None)),
            overrides: Rc::new(RefCell::new(Overrides {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }
}

impl<L: Lens> LensContext<L> {
    /// Context with no lens.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context whose base lens is `lens`.
    #[must_use]
    pub fn with_lens(lens: L) -> Self {
        let ctx = Self::default();
        ctx.set_base(Some(lens));
        ctx
    }

    /// Active lens, honoring the innermost override.
    #[must_use]
    pub fn current(&self) -> Option<L> {
        if let Some((_, lens)) = self.overrides.borrow().entries.last() {
            return Some(lens.clone());
        }
        self.base.borrow().clone()
    }

    /// Base lens without considering overrides.
    #[must_use]
    pub fn base(&self) -> Option<L> {
        self.base.borrow().clone()
    }

    /// Replace the base lens.
    pub fn set_base(&self, lens: Option<L>) {
        *self.base.borrow_mut() = lens;
    }

    /// Provide `lens` until the guard drops.
    #[must_use = "dropping this guard ends the provided lens"]
    pub fn provide(&self, lens: L) -> ProvidedLens<L> {
        let (id, depth) = {
            let mut stack = self.overrides.borrow_mut();
            let id = stack.next_id;
            stack.next_id += 1;
            stack.entries.push((id, lens));
            (id, stack.entries.len())
        };
        tracing::trace!(depth, "lens context provided");
        ProvidedLens {
            stack: Rc::clone(&self.overrides),
            id,
        }
    }

    /// Number of active overrides.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.overrides.borrow().entries.len()
    }
}

impl<L: Lens> fmt::Debug for LensContext<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LensContext")
            .field("has_base", &self.base.borrow().is_some())
            .field("depth", &self.depth())
            .finish()
    }
}

/// RAII guard for a lens pushed with [`LensContext::provide`].
#[must_use = "dropping this guard ends the provided lens"]
pub struct ProvidedLens<L: Lens> {
    stack: Rc<RefCell<Overrides<L>>>,
    id: u64,
}

impl<L: Lens> Drop for ProvidedLens<L> {
    fn drop(&mut self) {
        let removed = {
            let mut stack = self.stack.borrow_mut();
            let entries = &mut stack.entries;
            match entries.iter().position(|(id, _)| *id == self.id) {
                Some(pos) => {
                    if pos + 1 != entries.len() {
                        tracing::warn!(
                            depth = pos + 1,
                            active = entries.len(),
                            "lens context guards dropped out of order"
                        );
                    }
                    Some(entries.remove(pos))
                }
                None => None,
            }
        };
        // The lens may own listeners; release it outside the borrow.
        drop(removed);
    }
}

impl<L: Lens> fmt::Debug for ProvidedLens<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvidedLens")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lensync_core::Node;
    use serde_json::json;

    #[test]
    fn empty_context_has_no_lens() {
        let ctx: LensContext<Node> = LensContext::new();
        assert!(ctx.current().is_none());
    }

    #[test]
    fn overrides_shadow_base_and_restore() {
        let root = Node::new(json!({ "a": 1, "b": 2, "c": 3 }));
        let ctx = LensContext::with_lens(root.go("a"));
        {
            let _outer = ctx.provide(root.go("b"));
            assert_eq!(ctx.current().map(|l| l.get()), Some(json!(2)));
            {
                let _inner = ctx.provide(root.go("c"));
                assert_eq!(ctx.current().map(|l| l.get()), Some(json!(3)));
                assert_eq!(ctx.depth(), 2);
            }
            assert_eq!(ctx.current().map(|l| l.get()), Some(json!(2)));
        }
        assert_eq!(ctx.current().map(|l| l.get()), Some(json!(1)));
        assert_eq!(ctx.base().map(|l| l.get()), Some(json!(1)));
    }

    #[test]
    fn out_of_order_drop_removes_only_its_own_override() {
        let root = Node::new(json!({ "a": 1, "b": 2, "c": 3 }));
        let ctx = LensContext::with_lens(root.go("a"));
        let outer = ctx.provide(root.go("b"));
        let inner = ctx.provide(root.go("c"));

        drop(outer);
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.current().map(|l| l.get()), Some(json!(3)));

        drop(inner);
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.current().map(|l| l.get()), Some(json!(1)));
    }

    #[test]
    fn clones_share_the_stack() {
        let root = Node::new(json!(0));
        let ctx = LensContext::new();
        let other = ctx.clone();
        let _guard = ctx.provide(root.clone());
        assert!(other.current().is_some());
    }
}
