//! Property tests for trigger matching and debounce coalescing.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use lensync_core::{ChangeEvent, PathSegment};
use lensync_runtime::reactive::{Debounce, Directive, MatchMode, Trigger, Triggers};
use lensync_runtime::timer::TimerQueue;
use proptest::prelude::*;

fn arb_segment() -> impl Strategy<Value = PathSegment> {
    prop_oneof![
        "[a-z]{1,4}".prop_map(PathSegment::Key),
        (0usize..4).prop_map(PathSegment::Index),
    ]
}

/// Events as a tree actually produces them: exact, from an ancestor write
/// (non-empty diffs), or from a descendant write (empty diffs).
fn arb_event() -> impl Strategy<Value = ChangeEvent> {
    (
        0u8..3,
        prop::collection::vec(arb_segment(), 0..3),
        prop::collection::vec(arb_segment(), 1..4),
    )
        .prop_map(|(relation, base, suffix)| match relation {
            0 => ChangeEvent::exact(base),
            1 => ChangeEvent::new(false, suffix, base),
            _ => {
                let mut origin = base;
                origin.extend(suffix);
                ChangeEvent::new(false, Vec::new(), origin)
            }
        })
}

fn arb_directive() -> impl Strategy<Value = Directive> {
    prop::sample::select(Directive::ALL.to_vec())
}

fn arb_trigger() -> impl Strategy<Value = Trigger> {
    prop_oneof![
        arb_directive().prop_map(Trigger::from),
        Just(Trigger::named("no-such-directive")),
        any::<bool>().prop_map(|answer| Trigger::when(move |_| answer)),
        prop::option::of(any::<bool>()).prop_map(|answer| Trigger::opinion(move |_| answer)),
    ]
}

proptest! {
    /// Adding a declaration to a union never turns a match into a miss.
    #[test]
    fn union_is_monotonic(
        list in prop::collection::vec(arb_trigger(), 0..5),
        extra in arb_trigger(),
        event in arb_event(),
    ) {
        let before = Triggers::union(list.clone());
        if !list.is_empty() && before.matches(&event) {
            let after = before.clone().with(extra);
            prop_assert!(after.matches(&event));
        }
    }

    #[test]
    fn strict_matches_exactly_current(event in arb_event()) {
        prop_assert_eq!(Directive::Strict.matches(&event), event.is_current());
    }

    #[test]
    fn path_matches_current_or_ancestor(event in arb_event()) {
        let expected = event.is_current() || !event.diffs().is_empty();
        prop_assert_eq!(Directive::Path.matches(&event), expected);
    }

    #[test]
    fn subtree_matches_current_or_descendant(event in arb_event()) {
        let expected = event.is_current() || event.diffs().is_empty();
        prop_assert_eq!(Directive::Subtree.matches(&event), expected);
    }

    #[test]
    fn unrecognized_never_matches(name in "[A-Z]{3,8}", event in arb_event()) {
        let triggers = Triggers::union([Trigger::named(&name)]);
        prop_assert!(!triggers.matches(&event));
    }

    /// Priority mode is decided by the first declaration with an opinion.
    #[test]
    fn priority_follows_first_opinion(
        list in prop::collection::vec(arb_trigger(), 1..5),
        event in arb_event(),
    ) {
        let expected = list
            .iter()
            .find_map(|t| t.verdict(&event))
            .unwrap_or(false);
        let triggers = Triggers::priority(list);
        prop_assert_eq!(triggers.mode(), MatchMode::Priority);
        prop_assert_eq!(triggers.matches(&event), expected);
    }

    /// A burst of calls closer together than the delay runs only the last.
    #[test]
    fn debounce_runs_last_of_burst(gaps in prop::collection::vec(0u64..100, 1..12)) {
        let timers = TimerQueue::manual();
        let debounce = Debounce::new(Rc::new(timers.clone()), Duration::from_millis(100));
        let log = Rc::new(RefCell::new(Vec::new()));
        for (i, gap) in gaps.iter().enumerate() {
            let l = Rc::clone(&log);
            debounce.run_default(move || l.borrow_mut().push(i));
            timers.advance(Duration::from_millis(*gap));
        }
        timers.advance(Duration::from_millis(100));
        prop_assert_eq!(log.borrow().clone(), vec![gaps.len() - 1]);
        prop_assert_eq!(debounce.executed(), 1);
    }
}
