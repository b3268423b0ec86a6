//! End-to-end binding scenarios over a shared tree.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use lensync_core::{Lens, Node};
use lensync_runtime::reactive::{Directive, LensBinding, Scope, Timeout, Triggers};
use lensync_runtime::timer::TimerQueue;
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn counter() -> (Rc<Cell<u32>>, impl Fn() + 'static) {
    let hits = Rc::new(Cell::new(0));
    let h = Rc::clone(&hits);
    (hits, move || h.set(h.get() + 1))
}

#[test]
fn strict_ignores_other_paths() {
    init_tracing();
    let root = Node::new(json!({ "name": "a", "other": 0 }));
    let (hits, on_change) = counter();
    let _binding = LensBinding::new(&root.go("name"), Directive::Strict, on_change);

    root.go("other").set(json!(1));
    root.set(json!({ "name": "b", "other": 1 }));
    assert_eq!(hits.get(), 0, "sibling and ancestor writes are not exact");

    root.go("name").set(json!("c"));
    assert_eq!(hits.get(), 1);
}

#[test]
fn path_follows_ancestors_not_siblings() {
    init_tracing();
    let root = Node::new(json!({ "user": { "name": "a" }, "sibling": 0 }));
    let (hits, on_change) = counter();
    let _binding = LensBinding::new(&root.go("user").go("name"), "path", on_change);

    root.go("user").set(json!({ "name": "b" }));
    assert_eq!(hits.get(), 1);

    root.go("sibling").set(json!(1));
    assert_eq!(hits.get(), 1);
}

#[test]
fn debounced_setter_commits_last_value_once() {
    init_tracing();
    let timers = TimerQueue::manual();
    let root = Node::new(json!({ "query": "" }));
    let query = root.go("query");

    let commits = Rc::new(Cell::new(0));
    let c = Rc::clone(&commits);
    let _spy = query.subscribe(move |event| {
        if event.is_current() {
            c.set(c.get() + 1);
        }
    });

    let binding = LensBinding::debounced(
        Some(&query),
        Timeout::split(Duration::ZERO, Duration::from_millis(200)),
        Triggers::strict(),
        Rc::new(timers.clone()),
        || {},
    );
    let setter = binding.setter();
    for i in 1..=5 {
        setter.set(json!(format!("q{i}")));
        timers.advance(Duration::from_millis(50));
    }
    timers.advance(Duration::from_millis(200));

    assert_eq!(commits.get(), 1);
    assert_eq!(query.get(), json!("q5"));
}

#[test]
fn derived_store_reseed_keeps_subscription() {
    init_tracing();
    let timers = TimerQueue::manual();
    let scope = Scope::with_scheduler(Rc::new(timers));
    let frame = |seed: &str| scope.render(|cx| cx.use_derived_store(seed.to_owned()));

    let store = frame("X");
    let seen = Rc::new(Cell::new(0));
    let s = Rc::clone(&seen);
    let sub = store.subscribe(move |_| s.set(s.get() + 1));

    let again = frame("Y");
    assert_eq!(again.get(), "Y");
    assert_eq!(store.get(), "Y");
    assert!(sub.is_active());
    assert_eq!(seen.get(), 1);
}

#[test]
fn scope_binding_observes_post_write_value() {
    init_tracing();
    let root = Node::new(json!({ "list": [1, 2, 3] }));
    let scope = Scope::with_scheduler(Rc::new(TimerQueue::manual()));
    let renders = Rc::new(Cell::new(0));
    let r = Rc::clone(&renders);
    scope.on_invalidate(move || r.set(r.get() + 1));

    let frame = || scope.render(|cx| cx.use_lens(&root.go("list"), Directive::Subtree));
    let list = frame();
    root.go("list").go(1).set(json!(20));
    assert_eq!(renders.get(), 1);
    assert!(scope.take_dirty());
    assert_eq!(frame().get(), json!([1, 20, 3]));
    assert_eq!(list.get(), json!([1, 20, 3]));
}
