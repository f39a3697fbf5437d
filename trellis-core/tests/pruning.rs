//! Property Tests for Dependency Pruning
//!
//! After any run, a computation depends on exactly the keys that run read,
//! whatever it read before and however deeply it is nested.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use proptest::prelude::*;
use trellis_core::observe::reactive;
use trellis_core::reactive::{effect, effect_with, Computation, DepKey, EffectOptions, Runtime};
use trellis_core::value::{RawObject, Value};

const KEYS: usize = 8;

fn key(i: usize) -> String {
    format!("k{i}")
}

fn object() -> RawObject {
    RawObject::from_props((0..KEYS).map(|i| (key(i), Value::from(i))))
}

/// A computation reading whatever subset of keys `mask` selects.
fn reader(state: &Value, mask: &Rc<RefCell<Vec<bool>>>, runs: &Rc<Cell<usize>>) -> Computation {
    let (state, mask, runs) = (state.clone(), mask.clone(), runs.clone());
    effect_with(
        move || {
            runs.set(runs.get() + 1);
            for (i, read) in mask.borrow().iter().enumerate() {
                if *read {
                    state.get(key(i).as_str());
                }
            }
        },
        EffectOptions::new().lazy(),
    )
}

fn observed_keys(raw: &RawObject) -> Vec<bool> {
    (0..KEYS)
        .map(|i| Runtime::observer_count(raw, &DepKey::prop(key(i).as_str())) > 0)
        .collect()
}

fn arb_mask() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), KEYS)
}

proptest! {
    /// Property: dependencies equal the reads of the latest run
    #[test]
    fn prop_dependencies_follow_latest_run(masks in prop::collection::vec(arb_mask(), 1..8)) {
        let raw = object();
        let state = reactive(&raw.clone().into());
        let mask = Rc::new(RefCell::new(Vec::new()));
        let runs = Rc::new(Cell::new(0));
        let computation = reader(&state, &mask, &runs);

        for next in masks {
            *mask.borrow_mut() = next.clone();
            computation.run();
            prop_assert_eq!(observed_keys(&raw), next.clone());
            prop_assert_eq!(computation.dependency_count(), next.iter().filter(|read| **read).count());
        }
        computation.stop();
        prop_assert!(!Runtime::is_observed(&raw));
    }

    /// Property: writing a key the latest run skipped never reruns it
    #[test]
    fn prop_unread_writes_are_ignored(first in arb_mask(), second in arb_mask(), written in 0..KEYS) {
        let raw = object();
        let state = reactive(&raw.clone().into());
        let mask = Rc::new(RefCell::new(first));
        let runs = Rc::new(Cell::new(0));
        let computation = reader(&state, &mask, &runs);
        computation.run();

        *mask.borrow_mut() = second.clone();
        computation.run();
        let before = runs.get();

        state.set(key(written).as_str(), Value::from(100 + written));
        let expected = if second[written] { before + 1 } else { before };
        prop_assert_eq!(runs.get(), expected);
        computation.stop();
    }

    /// Property: pruning holds at any nesting depth
    #[test]
    fn prop_pruning_at_depth(depth in 0usize..40, first in arb_mask(), second in arb_mask()) {
        let raw = object();
        let state = reactive(&raw.clone().into());
        let mask = Rc::new(RefCell::new(first));
        let runs = Rc::new(Cell::new(0));
        let computation = reader(&state, &mask, &runs);

        // Run the reader from inside `depth` enclosing computations.
        let nested = Rc::new(RefCell::new(Vec::new()));
        fn enclose(depth: usize, computation: Computation, nested: Rc<RefCell<Vec<Computation>>>) {
            let slot = nested.clone();
            let outer = effect(move || {
                if depth == 0 {
                    computation.run();
                } else {
                    enclose(depth - 1, computation.clone(), nested.clone());
                }
            });
            slot.borrow_mut().push(outer);
        }
        enclose(depth, computation.clone(), nested.clone());

        *mask.borrow_mut() = second.clone();
        enclose(depth, computation.clone(), nested.clone());
        prop_assert_eq!(observed_keys(&raw), second);

        computation.stop();
        for outer in nested.borrow().iter() {
            outer.stop();
        }
    }
}
