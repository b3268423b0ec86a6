#![forbid(unsafe_code)]

//! Change events delivered to lens listeners.
//!
//! A [`ChangeEvent`] is built fresh for every listener affected by a write. It
//! never carries the new value: listeners re-read through their lens.
//!
//! # Relation Between Write And Listener
//!
//! | Listener position      | `current` | `diffs`                          |
//! |------------------------|-----------|----------------------------------|
//! | exactly the write node | `true`    | empty                            |
//! | ancestor of the write  | `false`   | empty                            |
//! | descendant of the write| `false`   | suffix from write node to listener|
//! | unrelated              | no event  |                                  |

use crate::path::{Path, PathSegment, is_prefix};

/// Where a write landed relative to a listener's node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    /// The write targeted the listener's own node.
    Exact,
    /// The write targeted a node below the listener.
    Descendant,
    /// The write targeted a node above the listener.
    Ancestor,
}

/// Notification describing how a write relates to a listener's node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    current: bool,
    diffs: Vec<PathSegment>,
    origin: Path,
}

impl ChangeEvent {
    /// Build an event from raw parts.
    #[must_use]
    pub fn new(current: bool, diffs: Vec<PathSegment>, origin: Path) -> Self {
        Self {
            current,
            diffs,
            origin,
        }
    }

    /// Event for a listener whose own node was written.
    #[must_use]
    pub fn exact(origin: Path) -> Self {
        Self::new(true, Vec::new(), origin)
    }

    /// Relate a write at `origin` to a listener at `listener`.
    ///
    /// Returns `None` when the two paths are unrelated (neither is a prefix
    /// of the other).
    #[must_use]
    pub fn between(listener: &[PathSegment], origin: &[PathSegment]) -> Option<Self> {
        if listener == origin {
            Some(Self::exact(origin.to_vec()))
        } else if is_prefix(listener, origin) {
            Some(Self::new(false, Vec::new(), origin.to_vec()))
        } else if is_prefix(origin, listener) {
            let suffix = listener[origin.len()..].to_vec();
            Some(Self::new(false, suffix, origin.to_vec()))
        } else {
            None
        }
    }

    /// Whether the write targeted exactly this node.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.current
    }

    /// Path suffix from the write node down to the listener's node.
    ///
    /// Empty when the write happened at or below the listener.
    #[must_use]
    pub fn diffs(&self) -> &[PathSegment] {
        &self.diffs
    }

    /// Absolute path of the write that produced this event.
    #[must_use]
    pub fn origin(&self) -> &[PathSegment] {
        &self.origin
    }

    /// Classify the write relative to the listener.
    #[must_use]
    pub fn relation(&self) -> Relation {
        if self.current {
            Relation::Exact
        } else if self.diffs.is_empty() {
            Relation::Descendant
        } else {
            Relation::Ancestor
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(segments: &[&str]) -> Path {
        segments.iter().map(|s| PathSegment::from(*s)).collect()
    }

    #[test]
    fn exact_write_is_current() {
        let e = ChangeEvent::between(&p(&["a", "b"]), &p(&["a", "b"])).unwrap();
        assert!(e.is_current());
        assert!(e.diffs().is_empty());
        assert_eq!(e.relation(), Relation::Exact);
    }

    #[test]
    fn write_below_listener_has_empty_diffs() {
        let e = ChangeEvent::between(&p(&["a"]), &p(&["a", "b", "c"])).unwrap();
        assert!(!e.is_current());
        assert!(e.diffs().is_empty());
        assert_eq!(e.origin(), p(&["a", "b", "c"]).as_slice());
        assert_eq!(e.relation(), Relation::Descendant);
    }

    #[test]
    fn write_above_listener_carries_suffix() {
        let e = ChangeEvent::between(&p(&["a", "b", "c"]), &p(&["a"])).unwrap();
        assert!(!e.is_current());
        assert_eq!(e.diffs(), p(&["b", "c"]).as_slice());
        assert_eq!(e.relation(), Relation::Ancestor);
    }

    #[test]
    fn root_write_reaches_everything() {
        let e = ChangeEvent::between(&p(&["x"]), &[]).unwrap();
        assert_eq!(e.diffs(), p(&["x"]).as_slice());
    }

    #[test]
    fn siblings_are_unrelated() {
        assert!(ChangeEvent::between(&p(&["a", "b"]), &p(&["a", "c"])).is_none());
    }
}
