//! Dependency Cells
//!
//! A dependency cell is the set of computations that read one
//! `(target, key)` pair, plus the two marker masks used to diff a
//! computation's reads between runs without rebuilding its dependency list.
//!
//! # Marker bits
//!
//! A computation running at nesting depth `d` owns bit `1 << d`. At run
//! start every cell it already depends on gets that bit set in
//! `was_tracked`; each read during the run sets it in `new_tracked`. At run
//! end a cell with the bit in `was_tracked` but not in `new_tracked` was not
//! read this time, and the computation leaves it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::effect::EffectCore;
use super::subscriber::{ComputationId, Subscriber};

/// The set of computations interested in one `(target, key)` pair.
pub(crate) struct Dep {
    members: RefCell<IndexMap<ComputationId, Rc<dyn Subscriber>>>,
    was_tracked: Cell<u32>,
    new_tracked: Cell<u32>,
}

impl Dep {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Self {
            members: RefCell::new(IndexMap::new()),
            was_tracked: Cell::new(0),
            new_tracked: Cell::new(0),
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub(crate) fn contains(&self, id: ComputationId) -> bool {
        self.members.borrow().contains_key(&id)
    }

    pub(crate) fn insert(&self, subscriber: Rc<dyn Subscriber>) {
        let id = subscriber.core().id();
        self.members.borrow_mut().insert(id, subscriber);
    }

    /// Remove a member. The removed handle is returned so the caller can
    /// drop it after releasing any borrows of its own.
    #[must_use]
    pub(crate) fn remove(&self, id: ComputationId) -> Option<Rc<dyn Subscriber>> {
        self.members.borrow_mut().shift_remove(&id)
    }

    /// Current members in insertion order.
    pub(crate) fn snapshot(&self) -> Vec<Rc<dyn Subscriber>> {
        self.members.borrow().values().cloned().collect()
    }

    pub(crate) fn was_tracked(&self, bit: u32) -> bool {
        self.was_tracked.get() & bit > 0
    }

    pub(crate) fn new_tracked(&self, bit: u32) -> bool {
        self.new_tracked.get() & bit > 0
    }

    pub(crate) fn mark_new(&self, bit: u32) {
        self.new_tracked.set(self.new_tracked.get() | bit);
    }

    fn mark_was(&self, bit: u32) {
        self.was_tracked.set(self.was_tracked.get() | bit);
    }

    fn clear_marks(&self, bit: u32) {
        self.was_tracked.set(self.was_tracked.get() & !bit);
        self.new_tracked.set(self.new_tracked.get() & !bit);
    }
}

/// Mark every cell the computation currently depends on as "was tracked".
pub(crate) fn init_dep_markers(core: &EffectCore, bit: u32) {
    for dep in core.deps.borrow().iter().filter_map(|dep| dep.upgrade()) {
        dep.mark_was(bit);
    }
}

/// Drop the computation from every cell it did not read this run, and
/// clear this depth's markers.
pub(crate) fn finalize_dep_markers(core: &EffectCore, bit: u32) {
    let mut released = Vec::new();
    core.deps.borrow_mut().retain(|dep| {
        let Some(dep) = dep.upgrade() else {
            // The target was forgotten.
            return false;
        };
        let keep = !(dep.was_tracked(bit) && !dep.new_tracked(bit));
        if !keep {
            released.extend(dep.remove(core.id()));
        }
        dep.clear_marks(bit);
        keep
    });
    drop(released);
}

/// Remove the computation from every cell and empty its dependency list.
pub(crate) fn cleanup_effect(core: &EffectCore) {
    let deps = std::mem::take(&mut *core.deps.borrow_mut());
    let released: Vec<_> = deps
        .iter()
        .filter_map(|dep| dep.upgrade())
        .filter_map(|dep| dep.remove(core.id()))
        .collect();
    drop(released);
}
