//! Trellis Core
//!
//! This crate provides the core runtime for Trellis, a fine-grained reactive
//! object graph. It implements:
//!
//! - Dependency tracking: computations record the object keys they read
//! - Computation lifecycle, recursion guards and scheduling hooks
//! - Wrappers that observe plain objects, arrays, maps and sets
//! - Scopes that dispose groups of computations together
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The dynamic value model and raw objects
//! - `reactive`: Computations, the observation registry, scopes and signals
//! - `observe`: Reactive and readonly wrappers over raw objects
//! - `diagnostics`: Non-fatal warnings for rejected operations
//! - `error`: Typed errors of the facade
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use trellis_core::observe::reactive;
//! use trellis_core::reactive::effect;
//! use trellis_core::value::RawObject;
//!
//! let state = reactive(&RawObject::from_props([("count", 1)]).into());
//! let doubled = Rc::new(Cell::new(0.0));
//!
//! let (state_in, doubled_in) = (state.clone(), doubled.clone());
//! effect(move || {
//!     let count = state_in.get("count").as_number().unwrap_or_default();
//!     doubled_in.set(count * 2.0);
//! });
//!
//! state.set("count", 5);
//! assert_eq!(doubled.get(), 10.0);
//! ```
//!
//! # Threading
//!
//! All runtime state is thread-local and handles are `Rc`-based, so each
//! thread is an independent reactive universe.

pub mod diagnostics;
pub mod error;
pub mod observe;
pub mod reactive;
pub mod value;

pub use error::{Error, Result};
pub use observe::{reactive, readonly, shallow_reactive, shallow_readonly, to_raw, Proxy};
pub use reactive::{effect, effect_scope, Computation, EffectOptions, Scope, Signal};
pub use value::{RawObject, Value};
