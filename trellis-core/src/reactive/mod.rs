//! Reactive Primitives
//!
//! This module implements the dependency-tracking engine: computations,
//! the observation registry, scopes, and a minimal signal box.
//!
//! # Concepts
//!
//! ## Computations
//!
//! A [`Computation`] is a re-runnable function. While it runs, every read
//! of reactive state records "this computation read key K of target T".
//! A later write to `(T, K)` reruns it, or hands it to its scheduler.
//!
//! ## Observation registry
//!
//! For each observed target, a map from key to a dependency cell holding
//! the computations that read it. [`track`] adds to it; [`trigger`]
//! consults it. Entries disappear when their target is dropped.
//!
//! ## Scopes
//!
//! A [`Scope`] collects the computations and cleanups created while it is
//! active, so they can be disposed of together.
//!
//! ## Signals
//!
//! A [`Signal`] boxes one value. It is the smallest reactive target, and the
//! one that object wrappers unwrap transparently.
//!
//! # Implementation Notes
//!
//! All state is thread-local and every handle is `Rc`-based, so each thread
//! is an independent reactive universe and handles cannot cross threads.

mod constants;
mod context;
mod dep;
mod effect;
mod runtime;
mod scope;
mod signal;
mod subscriber;

pub use constants::MAX_MARKER_BITS;
pub use context::{enable_tracking, is_tracking, pause_tracking, reset_tracking, untracked};
pub use effect::{effect, effect_with, stop, Computation, EffectOptions, WeakComputation};
pub use runtime::{track, trigger, DebuggerEvent, DepKey, OpKind, Runtime, Trackable, TrackOp, TriggerOp};
pub use scope::{current_scope, effect_scope, on_scope_dispose, Scope};
pub use signal::Signal;
pub use subscriber::ComputationId;

pub(crate) use signal::WeakSignal;
