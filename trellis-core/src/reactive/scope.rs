//! Scopes
//!
//! A [`Scope`] groups computations and cleanup callbacks so they can be
//! disposed together.
//!
//! Computations created while a scope is active (inside [`Scope::run`])
//! register into it. A scope created while another is active becomes its
//! child, unless it is detached. Stopping a scope stops its computations,
//! runs its cleanups in registration order, stops its children, and removes
//! it from its parent.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::subscriber::Subscriber;
use crate::diagnostics::{self, Diagnostic};

thread_local! {
    static ACTIVE_SCOPE: RefCell<Option<Scope>> = const { RefCell::new(None) };
}

fn set_active_scope(scope: Option<Scope>) -> Option<Scope> {
    ACTIVE_SCOPE.with(|active| active.replace(scope))
}

type Cleanup = Box<dyn FnOnce()>;

struct ScopeInner {
    active: Cell<bool>,
    detached: bool,
    computations: RefCell<Vec<Rc<dyn Subscriber>>>,
    cleanups: RefCell<Vec<Cleanup>>,
    parent: RefCell<Weak<ScopeInner>>,
    children: RefCell<Vec<Scope>>,
    /// Position in the parent's `children`.
    index: Cell<usize>,
}

/// A lifetime container for computations and cleanups.
///
/// Clones share the same scope.
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

/// Restores the previously active scope, including on unwind.
struct ActiveScopeGuard {
    previous: Option<Scope>,
}

impl Drop for ActiveScopeGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = ACTIVE_SCOPE.try_with(|active| drop(active.replace(previous)));
    }
}

impl Scope {
    /// Create a scope that is a child of the active scope, if any.
    pub fn new() -> Self {
        Self::create(false)
    }

    /// Create a scope with no parent. It must be stopped explicitly.
    pub fn detached() -> Self {
        Self::create(true)
    }

    fn create(detached: bool) -> Self {
        let scope = Scope {
            inner: Rc::new(ScopeInner {
                active: Cell::new(true),
                detached,
                computations: RefCell::new(Vec::new()),
                cleanups: RefCell::new(Vec::new()),
                parent: RefCell::new(Weak::new()),
                children: RefCell::new(Vec::new()),
                index: Cell::new(0),
            }),
        };
        if !detached {
            if let Some(parent) = current_scope() {
                let mut children = parent.inner.children.borrow_mut();
                scope.inner.index.set(children.len());
                children.push(scope.clone());
                *scope.inner.parent.borrow_mut() = Rc::downgrade(&parent.inner);
            }
        }
        scope
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn is_detached(&self) -> bool {
        self.inner.detached
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn computation_count(&self) -> usize {
        self.inner.computations.borrow().len()
    }

    /// The scope this one is a child of.
    pub fn parent(&self) -> Option<Scope> {
        self.inner.parent.borrow().upgrade().map(|inner| Scope { inner })
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` with this scope active.
    ///
    /// Returns `None` and emits a diagnostic if the scope was stopped.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            diagnostics::emit(Diagnostic::InactiveScope);
            return None;
        }
        let _guard = ActiveScopeGuard {
            previous: set_active_scope(Some(self.clone())),
        };
        Some(f())
    }

    /// Register a callback to run when the scope stops.
    pub fn add_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
    }

    /// Stop every computation, run every cleanup, stop every child scope,
    /// and detach from the parent.
    pub fn stop(&self) {
        self.stop_inner(false);
    }

    fn stop_inner(&self, from_parent: bool) {
        if !self.is_active() {
            return;
        }
        let computations = std::mem::take(&mut *self.inner.computations.borrow_mut());
        for computation in &computations {
            computation.core().stop();
        }
        let cleanups = std::mem::take(&mut *self.inner.cleanups.borrow_mut());
        for cleanup in cleanups {
            cleanup();
        }
        let children = std::mem::take(&mut *self.inner.children.borrow_mut());
        for child in &children {
            child.stop_inner(true);
        }
        debug!(
            computations = computations.len(),
            children = children.len(),
            "scope stopped"
        );

        let parent = std::mem::take(&mut *self.inner.parent.borrow_mut());
        if !from_parent {
            if let Some(parent) = parent.upgrade() {
                let removed = remove_child(&parent, self);
                drop(removed);
            }
        }
        self.inner.active.set(false);
    }
}

/// Swap-remove `child` from `parent`'s children.
fn remove_child(parent: &ScopeInner, child: &Scope) -> Option<Scope> {
    let mut children = parent.children.borrow_mut();
    let index = child.inner.index.get();
    if !children.get(index).is_some_and(|entry| entry.ptr_eq(child)) {
        return None;
    }
    let removed = children.swap_remove(index);
    if let Some(moved) = children.get(index) {
        moved.inner.index.set(index);
    }
    Some(removed)
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("active", &self.is_active())
            .field("detached", &self.is_detached())
            .field("computations", &self.computation_count())
            .field("children", &self.child_count())
            .finish()
    }
}

/// Create a scope. A non-detached scope becomes a child of the active scope.
pub fn effect_scope(detached: bool) -> Scope {
    Scope::create(detached)
}

/// The scope currently running, if any.
pub fn current_scope() -> Option<Scope> {
    ACTIVE_SCOPE.try_with(|active| active.borrow().clone()).ok().flatten()
}

/// Register a cleanup with the active scope.
///
/// Emits a diagnostic and drops the callback if no scope is active.
pub fn on_scope_dispose(cleanup: impl FnOnce() + 'static) {
    match current_scope() {
        Some(scope) => scope.add_cleanup(cleanup),
        None => diagnostics::emit(Diagnostic::NoActiveScope),
    }
}

/// Register a new computation with `scope`, or the active scope.
pub(crate) fn record_computation(computation: Rc<dyn Subscriber>, scope: Option<&Scope>) {
    let scope = scope.cloned().or_else(current_scope);
    if let Some(scope) = scope.filter(Scope::is_active) {
        scope.inner.computations.borrow_mut().push(computation);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_sets_and_restores_active_scope() {
        let scope = Scope::new();
        assert!(current_scope().is_none());

        let inside = scope.run(|| current_scope().is_some_and(|active| active.ptr_eq(&scope)));
        assert_eq!(inside, Some(true));
        assert!(current_scope().is_none());
    }

    #[test]
    fn run_restores_active_scope_after_panic() {
        let scope = Scope::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            scope.run(|| panic!("boom"));
        }));
        assert!(result.is_err());
        assert!(current_scope().is_none());
    }

    #[test]
    fn nested_scopes_become_children() {
        let parent = Scope::new();
        let (child, detached) = parent
            .run(|| (Scope::new(), Scope::detached()))
            .unwrap();

        assert_eq!(parent.child_count(), 1);
        assert!(child.parent().is_some_and(|p| p.ptr_eq(&parent)));
        assert!(detached.parent().is_none());
        assert!(detached.is_detached());
    }

    #[test]
    fn stopping_a_child_swap_removes_it() {
        let parent = Scope::new();
        let children: Vec<Scope> = parent.run(|| (0..3).map(|_| Scope::new()).collect()).unwrap();

        children[0].stop();
        assert_eq!(parent.child_count(), 2);

        // The last child moved into slot 0 and must still detach cleanly.
        children[2].stop();
        assert_eq!(parent.child_count(), 1);
        children[1].stop();
        assert_eq!(parent.child_count(), 0);
    }

    #[test]
    fn cleanups_run_in_registration_order_once() {
        let scope = Scope::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            scope.add_cleanup(move || log.borrow_mut().push(i));
        }

        scope.stop();
        scope.stop();
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert!(!scope.is_active());
    }

    #[test]
    fn running_stopped_scope_warns() {
        let scope = Scope::new();
        scope.stop();
        let (result, captured) = diagnostics::capture(|| scope.run(|| 1));
        assert_eq!(result, None);
        assert_eq!(captured, vec![Diagnostic::InactiveScope]);
    }

    #[test]
    fn on_scope_dispose_without_scope_warns() {
        let ((), captured) = diagnostics::capture(|| on_scope_dispose(|| {}));
        assert_eq!(captured, vec![Diagnostic::NoActiveScope]);
    }
}
