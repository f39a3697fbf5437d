//! Signal Implementation
//!
//! A Signal boxes a single value. Reading it inside a computation registers
//! the computation as a dependent; setting it to a different value reruns
//! every dependent.
//!
//! # Unwrapping
//!
//! A signal stored as a property of a deep wrapper is unwrapped on read:
//! the wrapper returns the signal's value rather than the signal. Writing a
//! non-signal value to such a property writes into the signal instead of
//! replacing it. Arrays are the exception: an element that is a signal is
//! returned as the signal itself.
//!
//! # Readonly signals
//!
//! [`Signal::readonly`] creates a signal whose `set` is rejected with a
//! diagnostic. A deep wrapper refuses to replace a readonly signal stored in
//! a property with a plain value.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{track, trigger, DepKey, Runtime, Trackable, TrackOp, TriggerOp};
use crate::diagnostics::{self, Diagnostic};
use crate::observe::{to_raw, to_reactive};
use crate::value::{has_changed, ObjectKind, PropKey, TargetId, Value};

pub(crate) struct SignalInner {
    id: TargetId,
    /// Stored in raw form; objects are wrapped on read.
    value: RefCell<Value>,
    readonly: bool,
}

impl Drop for SignalInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

/// A reactive box holding one [`Value`].
///
/// Clones share the same box.
///
/// # Example
///
/// ```rust
/// use trellis_core::reactive::{effect, Signal};
///
/// let count = Signal::new(1);
/// let doubled = Signal::new(0);
///
/// let (count_in, doubled_in) = (count.clone(), doubled.clone());
/// effect(move || {
///     let n = count_in.get().as_number().unwrap_or_default();
///     doubled_in.set(n * 2.0);
/// });
///
/// count.set(5);
/// assert_eq!(doubled.get_untracked().as_number(), Some(10.0));
/// ```
#[derive(Clone)]
pub struct Signal {
    inner: Rc<SignalInner>,
}

impl Signal {
    /// Create a new signal with the given initial value.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::create(value.into(), false)
    }

    /// Create a signal whose value cannot be set.
    pub fn readonly(value: impl Into<Value>) -> Self {
        Self::create(value.into(), true)
    }

    fn create(value: Value, readonly: bool) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: TargetId::next(),
                value: RefCell::new(to_raw(&value)),
                readonly,
            }),
        }
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.readonly
    }

    /// Get the current value.
    ///
    /// Inside a computation, this registers the computation as a dependent.
    /// Objects are returned wrapped with [`reactive`](crate::observe::reactive).
    pub fn get(&self) -> Value {
        track(self, TrackOp::Get, value_key());
        self.get_untracked()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> Value {
        let value = self.inner.value.borrow().clone();
        to_reactive(&value)
    }

    /// Set the value, rerunning dependents if it changed.
    ///
    /// Returns `false` if the signal is readonly.
    pub fn set(&self, value: impl Into<Value>) -> bool {
        if self.inner.readonly {
            diagnostics::emit(Diagnostic::ReadonlySignal);
            return false;
        }
        let value = to_raw(&value.into());
        let old = self.inner.value.borrow().clone();
        if has_changed(&value, &old) {
            drop(self.inner.value.replace(value.clone()));
            trigger(self, TriggerOp::Set, Some(&value_key()), Some(&value), Some(&old), None);
        }
        true
    }

    pub(crate) fn downgrade(&self) -> WeakSignal {
        WeakSignal(Rc::downgrade(&self.inner))
    }
}

fn value_key() -> DepKey {
    DepKey::Prop(PropKey::from("value"))
}

impl Trackable for Signal {
    fn target_id(&self) -> TargetId {
        self.inner.id
    }

    fn target_kind(&self) -> ObjectKind {
        ObjectKind::Plain
    }
}

impl PartialEq for Signal {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("readonly", &self.inner.readonly)
            .finish()
    }
}

/// Weak handle to a signal.
#[derive(Clone)]
pub(crate) struct WeakSignal(Weak<SignalInner>);

impl WeakSignal {
    pub(crate) fn upgrade(&self) -> Option<Signal> {
        self.0.upgrade().map(|inner| Signal { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{effect, Runtime};

    #[test]
    fn signal_get_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), Value::from(0));

        signal.set(42);
        assert_eq!(signal.get(), Value::from(42));
    }

    #[test]
    fn readonly_signal_rejects_set() {
        let signal = Signal::readonly(1);
        let (accepted, captured) = diagnostics::capture(|| signal.set(2));
        assert!(!accepted);
        assert_eq!(captured, vec![Diagnostic::ReadonlySignal]);
        assert_eq!(signal.get_untracked(), Value::from(1));
    }

    #[test]
    fn setting_same_value_does_not_trigger() {
        let signal = Signal::new(f64::NAN);
        let signal_clone = signal.clone();
        let computation = effect(move || {
            signal_clone.get();
        });

        signal.set(f64::NAN);
        assert_eq!(computation.run_count(), 1);
        signal.set(1);
        assert_eq!(computation.run_count(), 2);
    }

    #[test]
    fn stopping_effect_releases_signal() {
        let signal = Signal::new(0);
        let signal_clone = signal.clone();
        let computation = effect(move || {
            signal_clone.get();
        });
        assert!(Runtime::is_observed(&signal));
        assert_eq!(computation.dependency_count(), 1);

        computation.stop();
        assert!(!Runtime::is_observed(&signal));
    }

    #[test]
    fn object_values_are_wrapped_on_read() {
        let object = crate::value::RawObject::plain();
        let signal = Signal::new(&object);
        assert!(crate::observe::is_reactive(&signal.get()));
        assert_eq!(crate::observe::to_raw(&signal.get()), Value::from(&object));
    }
}
