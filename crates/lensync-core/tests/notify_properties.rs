//! Property tests for notification routing in a shared tree.

use std::cell::RefCell;
use std::rc::Rc;

use lensync_core::{Lens, Node, PathSegment, Relation, is_ancestor};
use proptest::prelude::*;
use serde_json::{Value, json};

fn fixture() -> Value {
    json!({
        "a": { "x": 1, "y": [1, 2] },
        "b": { "x": 2 },
        "c": 3
    })
}

fn arb_path() -> impl Strategy<Value = Vec<PathSegment>> {
    let key = prop::sample::select(vec!["a", "b", "c", "x", "y"]).prop_map(PathSegment::from);
    let index = (0usize..3).prop_map(PathSegment::from);
    prop::collection::vec(prop_oneof![3 => key, 1 => index], 0..4)
}

fn node_at(root: &Node, path: &[PathSegment]) -> Node {
    path.iter().cloned().fold(root.clone(), |node, seg| node.go(seg))
}

proptest! {
    /// A listener hears a write iff it is the written node, an ancestor of it,
    /// or a descendant whose value changed. The event's relation agrees.
    #[test]
    fn delivery_follows_tree_relation(listener in arb_path(), write in arb_path(), marker in 100i64..200) {
        let root = Node::new(fixture());
        let target = node_at(&root, &listener);
        let written = node_at(&root, &write);
        let before = target.get();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = target.subscribe(move |event| s.borrow_mut().push(event.relation()));

        let changed_root = written.get() != json!(marker);
        written.set(json!(marker));

        let expected = if !changed_root {
            None
        } else if listener == write {
            Some(Relation::Exact)
        } else if is_ancestor(&target, &written) {
            Some(Relation::Descendant)
        } else if is_ancestor(&written, &target) && target.get() != before {
            Some(Relation::Ancestor)
        } else {
            None
        };
        let seen = seen.borrow();
        prop_assert_eq!(seen.len(), usize::from(expected.is_some()));
        if let Some(relation) = expected {
            prop_assert_eq!(seen[0], relation);
        }
    }

    /// Writing the value already present never notifies anyone.
    #[test]
    fn equal_write_is_silent(listener in arb_path(), write in arb_path()) {
        let root = Node::new(fixture());
        let hits = Rc::new(RefCell::new(0u32));
        let h = Rc::clone(&hits);
        let _sub = node_at(&root, &listener).subscribe(move |_| *h.borrow_mut() += 1);
        let written = node_at(&root, &write);
        if written.exists() {
            written.set(written.get());
            prop_assert_eq!(*hits.borrow(), 0);
        }
    }
}
