//! Tracked Computations
//!
//! A [`Computation`] wraps a function that reads reactive state. Running it
//! records every read; a later write to anything it read reruns it, or
//! hands it to its scheduler.
//!
//! # How Computations Work
//!
//! 1. [`effect`] creates a computation and runs it once to establish its
//!    dependencies. [`Computation::new`] and the `lazy` option skip that
//!    first run.
//!
//! 2. During [`Computation::run`] the computation is the active one: reads
//!    through wrappers and signals register it with their dependency cells.
//!    Cells it no longer reads are dropped when the run ends.
//!
//! 3. When a write affects one of its cells, the computation reruns inline,
//!    or its scheduler is called instead if it has one.
//!
//! # Recursion
//!
//! A computation that is already running (directly, or as an ancestor of
//! the running computation) is not re-entered by `run()`, and a write made
//! by a computation does not retrigger it. Both guards are lifted by
//! `allow_recurse`.
//!
//! # Stopping
//!
//! [`Computation::stop`] removes the computation from every cell and calls
//! its `on_stop` hook. Stopping a computation from inside its own run defers
//! the cleanup until the run ends.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::trace;

use super::context::{untracked, ReactiveContext};
use super::dep::{cleanup_effect, Dep};
use super::runtime::DebuggerEvent;
use super::scope::{record_computation, Scope};
use super::subscriber::{ComputationId, Subscriber};

type Hook = Rc<dyn Fn()>;
type DebuggerHook = Rc<dyn Fn(&DebuggerEvent)>;

/// Lifecycle state shared by every computation, whatever its output type.
pub(crate) struct EffectCore {
    id: ComputationId,
    active: Cell<bool>,
    pub(crate) deps: RefCell<SmallVec<[Weak<Dep>; 8]>>,
    /// The computation that was running when this one started.
    pub(crate) parent: RefCell<Option<Rc<dyn Subscriber>>>,
    defer_stop: Cell<bool>,
    derived: bool,
    allow_recurse: Cell<bool>,
    run_count: Cell<usize>,
    pub(crate) scheduler: Option<Hook>,
    on_stop: Option<Hook>,
    pub(crate) on_track: Option<DebuggerHook>,
    pub(crate) on_trigger: Option<DebuggerHook>,
}

impl EffectCore {
    fn new(options: &EffectOptions) -> Self {
        Self {
            id: ComputationId::new(),
            active: Cell::new(true),
            deps: RefCell::new(SmallVec::new()),
            parent: RefCell::new(None),
            defer_stop: Cell::new(false),
            derived: options.derived,
            allow_recurse: Cell::new(options.allow_recurse),
            run_count: Cell::new(0),
            scheduler: options.scheduler.clone(),
            on_stop: options.on_stop.clone(),
            on_track: options.on_track.clone(),
            on_trigger: options.on_trigger.clone(),
        }
    }

    pub(crate) fn id(&self) -> ComputationId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn is_derived(&self) -> bool {
        self.derived
    }

    pub(crate) fn allows_recurse(&self) -> bool {
        self.allow_recurse.get()
    }

    pub(crate) fn take_defer_stop(&self) -> bool {
        self.defer_stop.replace(false)
    }

    /// Leave every dependency cell and mark the computation inactive.
    ///
    /// Deferred while the computation is running or is an ancestor of the
    /// running one, so the frame that owns its markers finishes the stop.
    pub(crate) fn stop(&self) {
        if ReactiveContext::is_running(self.id) {
            self.defer_stop.set(true);
        } else if self.active.get() {
            cleanup_effect(self);
            if let Some(on_stop) = self.on_stop.clone() {
                on_stop();
            }
            self.active.set(false);
            trace!(computation = %self.id, "stop");
        }
    }

    fn dependency_count(&self) -> usize {
        self.deps.borrow().iter().filter(|dep| dep.strong_count() > 0).count()
    }
}

struct ComputationInner<T> {
    core: EffectCore,
    func: Rc<dyn Fn() -> T>,
}

impl<T: 'static> ComputationInner<T> {
    fn run(self: &Rc<Self>) -> Option<T> {
        if !self.core.is_active() {
            return Some(untracked(|| (self.func)()));
        }
        if !self.core.allows_recurse() && ReactiveContext::is_running(self.core.id) {
            return None;
        }
        let _context = ReactiveContext::enter(self.clone());
        self.core.run_count.set(self.core.run_count.get() + 1);
        Some((self.func)())
    }
}

impl<T: 'static> Subscriber for ComputationInner<T> {
    fn core(&self) -> &EffectCore {
        &self.core
    }

    fn rerun(self: Rc<Self>) {
        drop(self.run());
    }
}

/// Options for [`effect_with`] and [`Computation::new`].
#[derive(Clone, Default)]
pub struct EffectOptions {
    lazy: bool,
    scheduler: Option<Hook>,
    scope: Option<Scope>,
    allow_recurse: bool,
    derived: bool,
    on_stop: Option<Hook>,
    on_track: Option<DebuggerHook>,
    on_trigger: Option<DebuggerHook>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run on creation.
    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Call `scheduler` instead of rerunning inline when triggered.
    pub fn scheduler(mut self, scheduler: impl Fn() + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Register into `scope` instead of the active scope.
    pub fn scope(mut self, scope: &Scope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    /// Allow the computation to retrigger and re-enter itself.
    pub fn allow_recurse(mut self) -> Self {
        self.allow_recurse = true;
        self
    }

    /// Mark the computation as driving a cached value: it reruns before
    /// plain computations affected by the same write.
    pub fn derived(mut self) -> Self {
        self.derived = true;
        self
    }

    pub fn on_stop(mut self, on_stop: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(on_stop));
        self
    }

    /// Called each time the computation starts depending on a new cell.
    pub fn on_track(mut self, on_track: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(on_track));
        self
    }

    /// Called each time a write is about to rerun the computation.
    pub fn on_trigger(mut self, on_trigger: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(on_trigger));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("scheduler", &self.scheduler.is_some())
            .field("scope", &self.scope)
            .field("allow_recurse", &self.allow_recurse)
            .field("derived", &self.derived)
            .finish_non_exhaustive()
    }
}

/// A re-runnable unit of reactive work.
///
/// Clones share the same computation. The computation stays subscribed to
/// its dependencies after every handle is dropped; call [`stop`] (or stop
/// its scope) to dispose of it.
///
/// [`stop`]: Computation::stop
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use trellis_core::observe::reactive;
/// use trellis_core::reactive::effect;
/// use trellis_core::value::{RawObject, Value};
///
/// let state = reactive(&RawObject::from_props([("count", 0)]).into());
/// let seen = Rc::new(Cell::new(0.0));
///
/// let seen_in_effect = seen.clone();
/// let state_in_effect = state.clone();
/// effect(move || {
///     let count = state_in_effect.get("count").as_number().unwrap_or_default();
///     seen_in_effect.set(count);
/// });
///
/// state.set("count", 5);
/// assert_eq!(seen.get(), 5.0);
/// ```
pub struct Computation<T = ()> {
    inner: Rc<ComputationInner<T>>,
}

impl<T: 'static> Computation<T> {
    /// Create a computation without running it.
    ///
    /// It registers into the scope named by `options`, or the active scope.
    /// The `lazy` option has no effect here.
    pub fn new(func: impl Fn() -> T + 'static, options: EffectOptions) -> Self {
        Self::from_func(Rc::new(func), options)
    }

    /// Create a new computation around the function of `other`.
    ///
    /// Runs it unless `options` is lazy.
    pub fn from_existing(other: &Computation<T>, options: EffectOptions) -> Self {
        let computation = Self::from_func(other.inner.func.clone(), options.clone());
        if !options.lazy {
            computation.run();
        }
        computation
    }

    fn from_func(func: Rc<dyn Fn() -> T>, options: EffectOptions) -> Self {
        let inner = Rc::new(ComputationInner {
            core: EffectCore::new(&options),
            func,
        });
        record_computation(inner.clone(), options.scope.as_ref());
        Self { inner }
    }

    pub fn id(&self) -> ComputationId {
        self.inner.core.id
    }

    /// Run the function, recording its reads.
    ///
    /// Returns `None` without running when the computation is already
    /// running and does not allow recursion. A stopped computation still
    /// runs, but records nothing.
    pub fn run(&self) -> Option<T> {
        self.inner.run()
    }

    /// Dispose of the computation.
    pub fn stop(&self) {
        self.inner.core.stop();
    }

    pub fn is_active(&self) -> bool {
        self.inner.core.is_active()
    }

    pub fn is_derived(&self) -> bool {
        self.inner.core.is_derived()
    }

    pub fn allows_recurse(&self) -> bool {
        self.inner.core.allows_recurse()
    }

    pub fn set_allow_recurse(&self, allow: bool) {
        self.inner.core.allow_recurse.set(allow);
    }

    /// Number of times the function has run with tracking.
    pub fn run_count(&self) -> usize {
        self.inner.core.run_count.get()
    }

    /// Number of dependency cells the last run read.
    pub fn dependency_count(&self) -> usize {
        self.inner.core.dependency_count()
    }

    /// A handle that does not keep the computation alive.
    pub fn downgrade(&self) -> WeakComputation<T> {
        WeakComputation {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T> Clone for Computation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Computation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = &self.inner.core;
        f.debug_struct("Computation")
            .field("id", &core.id)
            .field("run_count", &core.run_count.get())
            .field("dependency_count", &core.dependency_count())
            .field("active", &core.is_active())
            .finish()
    }
}

/// Weak counterpart of [`Computation`], for schedulers that need to rerun
/// the computation they belong to.
pub struct WeakComputation<T = ()> {
    inner: Weak<ComputationInner<T>>,
}

impl<T> WeakComputation<T> {
    pub fn upgrade(&self) -> Option<Computation<T>> {
        self.inner.upgrade().map(|inner| Computation { inner })
    }
}

impl<T> Clone for WeakComputation<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Create a computation and run it once.
pub fn effect<T: 'static>(func: impl Fn() -> T + 'static) -> Computation<T> {
    effect_with(func, EffectOptions::default())
}

/// Create a computation with options. Runs it once unless `lazy`.
pub fn effect_with<T: 'static>(func: impl Fn() -> T + 'static, options: EffectOptions) -> Computation<T> {
    let lazy = options.lazy;
    let computation = Computation::new(func, options);
    if !lazy {
        computation.run();
    }
    computation
}

/// Dispose of a computation.
pub fn stop<T: 'static>(computation: &Computation<T>) {
    computation.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::reactive::Signal;
    use crate::value::Value;

    #[test]
    fn effect_runs_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let _effect = effect(move || {
            run_count_clone.set(run_count_clone.get() + 1);
        });

        assert_eq!(run_count.get(), 1);
    }

    #[test]
    fn lazy_effect_does_not_run_on_creation() {
        let run_count = Rc::new(Cell::new(0));
        let run_count_clone = run_count.clone();

        let computation = effect_with(
            move || {
                run_count_clone.set(run_count_clone.get() + 1);
            },
            EffectOptions::new().lazy(),
        );

        assert_eq!(run_count.get(), 0);
        assert_eq!(computation.run_count(), 0);

        computation.run();
        assert_eq!(run_count.get(), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn run_returns_the_function_output() {
        let signal = Signal::new(21);
        let signal_clone = signal.clone();
        let computation = Computation::new(
            move || signal_clone.get().as_number().unwrap_or_default() * 2.0,
            EffectOptions::default(),
        );
        assert_eq!(computation.run(), Some(42.0));
        assert_eq!(computation.dependency_count(), 1);
    }

    #[test]
    fn effect_reruns_when_dependency_changes() {
        let signal = Signal::new(0);
        let observed = Rc::new(Cell::new(-1.0));

        let signal_clone = signal.clone();
        let observed_clone = observed.clone();
        let computation = effect(move || {
            observed_clone.set(signal_clone.get().as_number().unwrap_or_default());
        });

        signal.set(42);
        assert_eq!(observed.get(), 42.0);
        assert_eq!(computation.run_count(), 2);
    }

    #[test]
    fn stopped_effect_does_not_rerun() {
        let signal = Signal::new(0);
        let on_stop_calls = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let on_stop_clone = on_stop_calls.clone();
        let computation = effect_with(
            move || {
                signal_clone.get();
            },
            EffectOptions::new().on_stop(move || on_stop_clone.set(on_stop_clone.get() + 1)),
        );

        stop(&computation);
        stop(&computation);
        assert!(!computation.is_active());
        assert_eq!(on_stop_calls.get(), 1);
        assert_eq!(computation.dependency_count(), 0);

        signal.set(1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn stopped_effect_runs_untracked() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let computation = effect(move || signal_clone.get());
        computation.stop();

        assert_eq!(computation.run(), Some(Value::from(0)));
        assert_eq!(computation.dependency_count(), 0);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn scheduler_replaces_inline_rerun() {
        let signal = Signal::new(0);
        let scheduled = Rc::new(Cell::new(0));

        let signal_clone = signal.clone();
        let scheduled_clone = scheduled.clone();
        let computation = effect_with(
            move || {
                signal_clone.get();
            },
            EffectOptions::new().scheduler(move || scheduled_clone.set(scheduled_clone.get() + 1)),
        );

        signal.set(1);
        assert_eq!(scheduled.get(), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn from_existing_reuses_the_function() {
        let calls = Rc::new(Cell::new(0));
        let calls_clone = calls.clone();
        let first = effect(move || calls_clone.set(calls_clone.get() + 1));
        let second = Computation::from_existing(&first, EffectOptions::default());

        assert_ne!(first.id(), second.id());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn clone_shares_state() {
        let first = effect(|| {});
        let second = first.clone();

        assert_eq!(first.id(), second.id());
        first.run();
        assert_eq!(second.run_count(), 2);

        first.stop();
        assert!(!second.is_active());
    }
}
