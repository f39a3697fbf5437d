//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a reactive value is
//! read, the current computation is recorded as a dependent.
//!
//! # Implementation
//!
//! Each thread holds a single "active computation" pointer. A computation
//! that starts running remembers the previous occupant as its parent, which
//! forms an implicit call stack through the parent links. The
//! [`ReactiveContext`] guard restores the previous state when dropped, so
//! the pointer is correct again after a panic unwinds through a run.
//!
//! The same thread-local state holds the nesting depth that selects each
//! run's marker bit, and the stack of "should track" flags manipulated by
//! [`pause_tracking`], [`enable_tracking`] and [`reset_tracking`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use super::constants::MAX_MARKER_BITS;
use super::dep::{cleanup_effect, finalize_dep_markers, init_dep_markers};
use super::subscriber::{ComputationId, Subscriber};

struct ContextState {
    active: RefCell<Option<Rc<dyn Subscriber>>>,
    should_track: Cell<bool>,
    track_stack: RefCell<Vec<bool>>,
    depth: Cell<u32>,
    op_bit: Cell<u32>,
}

thread_local! {
    static CONTEXT: ContextState = ContextState {
        active: RefCell::new(None),
        should_track: Cell::new(true),
        track_stack: RefCell::new(Vec::new()),
        depth: Cell::new(0),
        op_bit: Cell::new(1),
    };
}

fn bit_for(depth: u32) -> u32 {
    1u32.checked_shl(depth).unwrap_or(0)
}

/// Guard for one run of a computation.
///
/// While alive, the computation is the active one and reads register it as
/// a dependent. Dropping the guard prunes dependencies that were not read,
/// restores the previous computation and tracking flag, and performs a stop
/// that was requested during the run.
pub(crate) struct ReactiveContext {
    computation: Rc<dyn Subscriber>,
    previous: Option<Rc<dyn Subscriber>>,
    previous_parent: Option<Option<Rc<dyn Subscriber>>>,
    last_should_track: bool,
}

impl ReactiveContext {
    /// Make `computation` the active computation.
    ///
    /// The caller has already checked the ancestor chain; a computation
    /// that is re-entering itself keeps its original parent link so the
    /// chain stays acyclic.
    pub(crate) fn enter(computation: Rc<dyn Subscriber>) -> Self {
        CONTEXT.with(|state| {
            let id = computation.core().id();
            let previous = state.active.replace(Some(computation.clone()));
            let previous_parent = if is_ancestor_of(previous.as_ref(), id) {
                None
            } else {
                Some(computation.core().parent.replace(previous.clone()))
            };
            let last_should_track = state.should_track.replace(true);

            let depth = state.depth.get() + 1;
            let bit = bit_for(depth);
            state.depth.set(depth);
            state.op_bit.set(bit);
            if depth <= MAX_MARKER_BITS {
                init_dep_markers(computation.core(), bit);
            } else {
                cleanup_effect(computation.core());
            }
            trace!(computation = %id, depth, "run");

            Self {
                computation,
                previous,
                previous_parent,
                last_should_track,
            }
        })
    }

    /// Whether a computation is running and reads should be recorded.
    pub(crate) fn is_tracking() -> bool {
        CONTEXT
            .try_with(|state| state.should_track.get() && state.active.borrow().is_some())
            .unwrap_or(false)
    }

    /// The running computation.
    pub(crate) fn current() -> Option<Rc<dyn Subscriber>> {
        CONTEXT.try_with(|state| state.active.borrow().clone()).ok().flatten()
    }

    pub(crate) fn current_id() -> Option<ComputationId> {
        CONTEXT
            .try_with(|state| state.active.borrow().as_ref().map(|active| active.core().id()))
            .ok()
            .flatten()
    }

    /// Current nesting depth and its marker bit.
    pub(crate) fn depth() -> (u32, u32) {
        CONTEXT.with(|state| (state.depth.get(), state.op_bit.get()))
    }

    /// Whether the computation `id` is running or is an ancestor of the
    /// running computation.
    pub(crate) fn is_running(id: ComputationId) -> bool {
        CONTEXT
            .try_with(|state| is_ancestor_of(state.active.borrow().as_ref(), id))
            .unwrap_or(false)
    }
}

fn is_ancestor_of(start: Option<&Rc<dyn Subscriber>>, id: ComputationId) -> bool {
    let mut cursor = start.cloned();
    while let Some(current) = cursor {
        if current.core().id() == id {
            return true;
        }
        cursor = current.core().parent.borrow().clone();
    }
    false
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let core = self.computation.core();
        let restored = CONTEXT.try_with(|state| {
            let depth = state.depth.get();
            if depth <= MAX_MARKER_BITS {
                finalize_dep_markers(core, state.op_bit.get());
            }
            let depth = depth.saturating_sub(1);
            state.depth.set(depth);
            state.op_bit.set(bit_for(depth));

            let popped = state.active.replace(self.previous.take());
            debug_assert!(
                popped.as_ref().map(|popped| popped.core().id()) == Some(core.id()),
                "ReactiveContext mismatch: expected {}",
                core.id()
            );
            state.should_track.set(self.last_should_track);
            popped
        });
        if let Some(parent) = self.previous_parent.take() {
            drop(core.parent.replace(parent));
        }
        drop(restored);

        if core.take_defer_stop() {
            core.stop();
        }
    }
}

// ----------------------------------------------------------------------------
// Tracking flag
// ----------------------------------------------------------------------------

/// Stop recording reads until the matching [`reset_tracking`].
pub fn pause_tracking() {
    CONTEXT.with(|state| {
        let previous = state.should_track.replace(false);
        state.track_stack.borrow_mut().push(previous);
    });
}

/// Resume recording reads until the matching [`reset_tracking`].
pub fn enable_tracking() {
    CONTEXT.with(|state| {
        let previous = state.should_track.replace(true);
        state.track_stack.borrow_mut().push(previous);
    });
}

/// Undo the last [`pause_tracking`] or [`enable_tracking`].
pub fn reset_tracking() {
    CONTEXT.with(|state| {
        let previous = state.track_stack.borrow_mut().pop();
        state.should_track.set(previous.unwrap_or(true));
    });
}

/// Whether a read right now would be recorded.
pub fn is_tracking() -> bool {
    ReactiveContext::is_tracking()
}

struct ResetOnDrop;

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        let _ = CONTEXT.try_with(|state| {
            let previous = state.track_stack.borrow_mut().pop();
            state.should_track.set(previous.unwrap_or(true));
        });
    }
}

/// Run `f` without recording any reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    pause_tracking();
    let _reset = ResetOnDrop;
    f()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_flag_stack_nests() {
        assert!(!is_tracking());

        pause_tracking();
        enable_tracking();
        reset_tracking();
        CONTEXT.with(|state| assert!(!state.should_track.get()));
        reset_tracking();
        CONTEXT.with(|state| assert!(state.should_track.get()));
    }

    #[test]
    fn untracked_restores_flag_after_panic() {
        let result = std::panic::catch_unwind(|| {
            untracked(|| panic!("boom"));
        });
        assert!(result.is_err());
        CONTEXT.with(|state| {
            assert!(state.should_track.get());
            assert!(state.track_stack.borrow().is_empty());
        });
    }

    #[test]
    fn no_computation_means_no_tracking() {
        assert!(ReactiveContext::current().is_none());
        assert!(ReactiveContext::current_id().is_none());
        assert_eq!(ReactiveContext::depth(), (0, 1));
    }
}
