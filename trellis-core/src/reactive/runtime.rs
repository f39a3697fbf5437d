//! Reactive Runtime
//!
//! The runtime owns the observation registry: for every observed target, a
//! map from dependency key to [`Dep`] cell. [`track`] records the running
//! computation into a cell; [`trigger`] finds the cells a mutation affects
//! and reruns (or schedules) their computations.
//!
//! # How It Works
//!
//! 1. A computation runs. Every read through a wrapper calls [`track`] with
//!    the raw target and the key read.
//!
//! 2. `track` finds or creates the cell for `(target, key)` and adds the
//!    computation, using the per-depth marker bits to skip duplicates.
//!
//! 3. A write through a wrapper calls [`trigger`] with the mutation kind.
//!    The fan-out rules below select the affected cells; their members are
//!    deduplicated, derived computations run first, and each one is handed
//!    to its scheduler or rerun inline.
//!
//! # Fan-out
//!
//! - `Clear`: every cell of the target.
//! - A `length` write on an array: the `length` cell and every index cell at
//!   or past the new length.
//! - Otherwise the cell of the key itself, plus:
//!   - `Add`: the iterate cell (and the key-iterate cell for maps), or the
//!     `length` cell for a new array index;
//!   - `Delete`: the iterate cells, for non-arrays;
//!   - `Set` on a map: the iterate cell.
//!
//! # Lifetime
//!
//! The registry is thread-local and keyed by [`TargetId`]. Targets call
//! [`Runtime::forget`] when their last handle drops, which releases their
//! cells and, through them, any computation nothing else holds.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::constants::MAX_MARKER_BITS;
use super::context::ReactiveContext;
use super::dep::Dep;
use super::subscriber::{ComputationId, Subscriber};
use crate::value::{EntryKey, ObjectKind, PropKey, RawObject, TargetId, Value};

/// Kind of a tracked read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TrackOp {
    Get,
    Has,
    Iterate,
}

/// Kind of a triggering mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TriggerOp {
    Set,
    Add,
    Delete,
    Clear,
}

/// Key of a dependency cell within one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A property of a plain object, array or signal.
    Prop(PropKey),
    /// An entry of a map or set.
    Entry(EntryKey),
    /// Membership of the whole target.
    Iterate,
    /// Key membership of a map.
    MapKeyIterate,
}

impl DepKey {
    pub fn prop(key: impl Into<PropKey>) -> Self {
        DepKey::Prop(key.into())
    }

    pub fn entry(key: &Value) -> Self {
        DepKey::Entry(key.entry_key())
    }

    fn index(&self) -> Option<u32> {
        match self {
            DepKey::Prop(key) => key.index(),
            _ => None,
        }
    }

    fn is_length(&self) -> bool {
        matches!(self, DepKey::Prop(key) if key.is_length())
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(key) => write!(f, "{key}"),
            DepKey::Entry(key) => write!(f, "{key}"),
            DepKey::Iterate => f.write_str("[[iterate]]"),
            DepKey::MapKeyIterate => f.write_str("[[map key iterate]]"),
        }
    }
}

/// Anything reads can be tracked against.
///
/// Raw objects and signals implement this. A collaborator building its own
/// reactive box allocates a [`TargetId`] for it, calls [`track`] and
/// [`trigger`] with it, and calls [`Runtime::forget`] when it is dropped.
pub trait Trackable {
    fn target_id(&self) -> TargetId;

    /// Selects the fan-out rules used by [`trigger`].
    fn target_kind(&self) -> ObjectKind;
}

impl Trackable for RawObject {
    fn target_id(&self) -> TargetId {
        self.id()
    }

    fn target_kind(&self) -> ObjectKind {
        self.kind()
    }
}

/// Operation reported to debugger hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Track(TrackOp),
    Trigger(TriggerOp),
}

/// Event passed to a computation's `on_track` and `on_trigger` hooks.
#[derive(Debug, Clone)]
pub struct DebuggerEvent {
    pub computation: ComputationId,
    pub target: TargetId,
    pub kind: OpKind,
    pub key: Option<DepKey>,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    /// Snapshot of a collection before it was cleared.
    pub old_target: Option<RawObject>,
}

type DepsMap = IndexMap<DepKey, Rc<Dep>>;

thread_local! {
    static REGISTRY: RefCell<HashMap<TargetId, DepsMap>> = RefCell::new(HashMap::new());
}

/// The observation registry.
pub struct Runtime;

impl Runtime {
    /// Find or create the cell for `(target, key)`.
    pub(crate) fn dep(target: TargetId, key: DepKey) -> Rc<Dep> {
        REGISTRY.with(|registry| {
            registry
                .borrow_mut()
                .entry(target)
                .or_default()
                .entry(key)
                .or_insert_with(Dep::new)
                .clone()
        })
    }

    /// Drop every cell recorded against `target`.
    pub fn forget(target: TargetId) {
        let removed = REGISTRY
            .try_with(|registry| match registry.try_borrow_mut() {
                Ok(mut registry) => registry.remove(&target),
                Err(_) => None,
            })
            .ok()
            .flatten();
        if removed.is_some() {
            trace!(target = %target, "forget");
        }
        drop(removed);
    }

    /// Number of computations currently depending on `(target, key)`.
    pub fn observer_count(target: &impl Trackable, key: &DepKey) -> usize {
        REGISTRY.with(|registry| {
            registry
                .borrow()
                .get(&target.target_id())
                .and_then(|deps| deps.get(key))
                .map_or(0, |dep| dep.len())
        })
    }

    /// Whether any computation depends on any key of `target`.
    pub fn is_observed(target: &impl Trackable) -> bool {
        REGISTRY.with(|registry| {
            registry
                .borrow()
                .get(&target.target_id())
                .is_some_and(|deps| deps.values().any(|dep| dep.len() > 0))
        })
    }

    /// Whether the registry holds an entry for `target` at all.
    pub fn has_entry(target: &impl Trackable) -> bool {
        REGISTRY.with(|registry| registry.borrow().contains_key(&target.target_id()))
    }

    fn affected(target: TargetId, select: impl FnOnce(&DepsMap) -> SmallVec<[Rc<Dep>; 4]>) -> SmallVec<[Rc<Dep>; 4]> {
        REGISTRY.with(|registry| registry.borrow().get(&target).map(select).unwrap_or_default())
    }
}

/// Record that the running computation read `key` of `target`.
///
/// No-op unless a computation is running and tracking is enabled.
pub fn track(target: &impl Trackable, op: TrackOp, key: DepKey) {
    if !ReactiveContext::is_tracking() {
        return;
    }
    let Some(active) = ReactiveContext::current() else {
        return;
    };
    let dep = Runtime::dep(target.target_id(), key.clone());
    track_dep(&dep, &active, || DebuggerEvent {
        computation: active.core().id(),
        target: target.target_id(),
        kind: OpKind::Track(op),
        key: Some(key),
        new_value: None,
        old_value: None,
        old_target: None,
    });
}

fn track_dep(dep: &Rc<Dep>, active: &Rc<dyn Subscriber>, event: impl FnOnce() -> DebuggerEvent) {
    let core = active.core();
    let (depth, bit) = ReactiveContext::depth();
    let should_add = if depth <= MAX_MARKER_BITS {
        if dep.new_tracked(bit) {
            false
        } else {
            dep.mark_new(bit);
            !dep.was_tracked(bit)
        }
    } else {
        !dep.contains(core.id())
    };
    if !should_add {
        return;
    }
    dep.insert(active.clone());
    core.deps.borrow_mut().push(Rc::downgrade(dep));
    if let Some(on_track) = core.on_track.clone() {
        on_track(&event());
    }
}

/// Notify the computations affected by a mutation of `target`.
///
/// `key` is the mutated key (absent for `Clear`). `new_value` of a `length`
/// write on an array selects which index cells are invalidated.
pub fn trigger(
    target: &impl Trackable,
    op: TriggerOp,
    key: Option<&DepKey>,
    new_value: Option<&Value>,
    old_value: Option<&Value>,
    old_target: Option<&RawObject>,
) {
    let id = target.target_id();
    let kind = target.target_kind();
    let deps = Runtime::affected(id, |deps_map| {
        let mut deps = SmallVec::new();
        if op == TriggerOp::Clear {
            deps.extend(deps_map.values().cloned());
        } else if kind == ObjectKind::Array && key.is_some_and(DepKey::is_length) {
            let new_length = match new_value {
                Some(Value::Number(n)) => *n,
                _ => f64::NAN,
            };
            for (dep_key, dep) in deps_map {
                let out_of_range = dep_key.index().is_some_and(|i| f64::from(i) >= new_length);
                if dep_key.is_length() || out_of_range {
                    deps.push(dep.clone());
                }
            }
        } else {
            let mut push = |dep_key: &DepKey| {
                if let Some(dep) = deps_map.get(dep_key) {
                    deps.push(dep.clone());
                }
            };
            if let Some(key) = key {
                push(key);
            }
            match op {
                TriggerOp::Add => {
                    if kind != ObjectKind::Array {
                        push(&DepKey::Iterate);
                        if kind == ObjectKind::Map {
                            push(&DepKey::MapKeyIterate);
                        }
                    } else if key.and_then(DepKey::index).is_some() {
                        push(&DepKey::Prop(PropKey::length()));
                    }
                }
                TriggerOp::Delete => {
                    if kind != ObjectKind::Array {
                        push(&DepKey::Iterate);
                        if kind == ObjectKind::Map {
                            push(&DepKey::MapKeyIterate);
                        }
                    }
                }
                TriggerOp::Set => {
                    if kind == ObjectKind::Map {
                        push(&DepKey::Iterate);
                    }
                }
                TriggerOp::Clear => {}
            }
        }
        deps
    });
    if deps.is_empty() {
        return;
    }

    let mut effects: IndexMap<ComputationId, Rc<dyn Subscriber>> = IndexMap::new();
    for dep in &deps {
        for subscriber in dep.snapshot() {
            effects.entry(subscriber.core().id()).or_insert(subscriber);
        }
    }
    drop(deps);
    trace!(target = %id, ?op, ?key, computations = effects.len(), "trigger");

    let event = |computation: ComputationId| DebuggerEvent {
        computation,
        target: id,
        kind: OpKind::Trigger(op),
        key: key.cloned(),
        new_value: new_value.cloned(),
        old_value: old_value.cloned(),
        old_target: old_target.cloned(),
    };
    let (derived, plain): (Vec<_>, Vec<_>) = effects.into_values().partition(|effect| effect.core().is_derived());
    for effect in derived.into_iter().chain(plain) {
        trigger_effect(effect, &event);
    }
}

fn trigger_effect(effect: Rc<dyn Subscriber>, event: &impl Fn(ComputationId) -> DebuggerEvent) {
    let core = effect.core();
    if ReactiveContext::current_id() == Some(core.id()) && !core.allows_recurse() {
        return;
    }
    if let Some(on_trigger) = core.on_trigger.clone() {
        on_trigger(&event(core.id()));
    }
    match core.scheduler.clone() {
        Some(scheduler) => scheduler(),
        None => effect.rerun(),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
