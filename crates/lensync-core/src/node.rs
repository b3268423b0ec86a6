#![forbid(unsafe_code)]

//! [`Node`]: a lens addressing one path inside a shared JSON tree.
//!
//! All nodes derived from the same root share one `Rc` holding the tree value
//! and the listener registry. Writing through any node notifies listeners at
//! the written path, at its ancestors, and at descendants whose value changed.
//!
//! # Invariants
//!
//! 1. Writing a value equal to the current one is a no-op (no notification).
//! 2. The tree borrow is released before any listener runs, so listeners may
//!    read and write freely.
//! 3. Descendant listeners are only notified when their own value differs
//!    from what it was before the write.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::event::ChangeEvent;
use crate::lens::{Lens, LensKey, storage_id};
use crate::listeners::{Listener, ListenerRegistry, Subscription};
use crate::mapped::Typed;
use crate::path::{Path, PathSegment, display_path, is_prefix, value_at, write_at};

struct Root {
    value: RefCell<Value>,
    listeners: Rc<ListenerRegistry>,
}

/// Handle onto the value at one path of a shared tree.
#[derive(Clone)]
pub struct Node {
    root: Rc<Root>,
    path: Path,
}

impl Node {
    /// Create a new tree holding `value` and return its root node.
    #[must_use]
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            root: Rc::new(Root {
                value: RefCell::new(value.into()),
                listeners: Rc::new(ListenerRegistry::new()),
            }),
            path: Vec::new(),
        }
    }

    /// Create a new tree from any serializable value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::to_value(value)?))
    }

    /// Child node at `segment` below this one.
    #[must_use]
    pub fn go(&self, segment: impl Into<PathSegment>) -> Self {
        let mut path = self.path.clone();
        path.push(segment.into());
        Self {
            root: Rc::clone(&self.root),
            path,
        }
    }

    /// Parent node, or `None` at the root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, parent) = self.path.split_last()?;
        Some(Self {
            root: Rc::clone(&self.root),
            path: parent.to_vec(),
        })
    }

    /// Root node of this tree.
    #[must_use]
    pub fn root(&self) -> Self {
        Self {
            root: Rc::clone(&self.root),
            path: Vec::new(),
        }
    }

    /// Path of this node from the root.
    #[must_use]
    pub fn path(&self) -> &[PathSegment] {
        &self.path
    }

    /// Borrow the current value without cloning. `None` when the path does
    /// not resolve.
    ///
    /// The tree is borrowed for the duration of `f`; writing through any
    /// node of the same tree inside `f` panics.
    pub fn with<R>(&self, f: impl FnOnce(Option<&Value>) -> R) -> R {
        let tree = self.root.value.borrow();
        f(value_at(&tree, &self.path))
    }

    /// Whether the path currently resolves to a value.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.with(|value| value.is_some())
    }

    /// Typed view of this node through serde.
    #[must_use]
    pub fn typed<T>(&self) -> Typed<T>
    where
        T: Serialize + DeserializeOwned + Clone + Default + 'static,
    {
        Typed::new(self.clone())
    }

    /// Number of live listeners registered anywhere in this tree.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.root.listeners.len()
    }

    /// Whether `other` addresses the same tree.
    #[must_use]
    pub fn same_tree(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.root, &other.root)
    }

    fn deliver(&self, before: Option<Value>) {
        let origin = &self.path;
        let related = self.root.listeners.related(origin);
        if related.is_empty() {
            return;
        }

        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!(
            "lens_notify",
            path = %display_path(origin),
            listeners = related.len()
        )
        .entered();

        for (path, callback) in related {
            let Some(event) = ChangeEvent::between(&path, origin) else {
                continue;
            };
            if !event.diffs().is_empty() && !self.descendant_changed(before.as_ref(), &path) {
                continue;
            }
            // Detached while an earlier listener ran.
            let Some(callback) = callback.upgrade() else {
                continue;
            };
            callback(&event);
        }
    }

    fn descendant_changed(&self, before: Option<&Value>, listener: &[PathSegment]) -> bool {
        let relative = &listener[self.path.len()..];
        let previous = before.and_then(|value| value_at(value, relative));
        let tree = self.root.value.borrow();
        let current = value_at(&tree, listener);
        previous != current
    }
}

impl Lens for Node {
    type Value = Value;

    fn get(&self) -> Value {
        self.with(|value| value.cloned().unwrap_or(Value::Null))
    }

    fn set(&self, value: Value) {
        let before = {
            let mut tree = self.root.value.borrow_mut();
            let previous = value_at(&tree, &self.path);
            if previous == Some(&value) {
                return;
            }
            let before = previous.cloned();
            if !write_at(&mut tree, &self.path, value) {
                return;
            }
            before
        };
        tracing::trace!(path = %display_path(&self.path), "node written");
        self.deliver(before);
    }

    fn subscribe_listener(&self, listener: Rc<Listener>) -> Subscription {
        self.root.listeners.attach(self.path.clone(), listener)
    }

    fn key(&self) -> LensKey {
        LensKey::new(storage_id(&self.root), self.path.clone())
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("path", &display_path(&self.path))
            .field("value", &self.get())
            .finish()
    }
}

/// Whether `ancestor` is a strict ancestor of `node` within the same tree.
#[must_use]
pub fn is_ancestor(ancestor: &Node, node: &Node) -> bool {
    ancestor.same_tree(node)
        && ancestor.path.len() < node.path.len()
        && is_prefix(&ancestor.path, &node.path)
}
