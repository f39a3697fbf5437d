//! Property handlers for plain objects and arrays.
//!
//! Collections only answer markers and `size` here; their entries are
//! reached through the methods in `collection.rs`, and any other property
//! is forwarded to the raw collection untracked.

use super::{is_readonly, is_shallow, to_raw, to_reactive, to_readonly, Proxy};
use crate::diagnostics::{self, Diagnostic};
use crate::reactive::{track, trigger, DepKey, TrackOp, TriggerOp};
use crate::value::{has_changed, Marker, ObjectKind, PropKey, Value};

impl Proxy {
    pub(crate) fn get_prop(&self, key: &PropKey) -> Value {
        if let PropKey::Marker(marker) = key {
            return match marker {
                Marker::IsReactive => Value::Bool(!self.is_readonly()),
                Marker::IsReadonly => Value::Bool(self.is_readonly()),
                Marker::IsShallow => Value::Bool(self.is_shallow()),
                Marker::Raw => self.target(),
                Marker::Skip => Value::Bool(self.raw_ref().is_skipped()),
            };
        }
        if self.kind().is_collection() {
            return self.collection_prop(key);
        }

        let value = self.target().get_prop(key);
        if !key.is_trackable() {
            return value;
        }
        if !self.is_readonly() {
            track(self.raw_ref(), TrackOp::Get, DepKey::Prop(key.clone()));
        }
        if self.is_shallow() {
            return value;
        }
        match value {
            // Arrays keep signal elements boxed.
            Value::Signal(signal) if self.kind() == ObjectKind::Array && key.is_index() => Value::Signal(signal),
            Value::Signal(signal) => signal.get(),
            value if value.is_object() => {
                if self.is_readonly() {
                    to_readonly(&value)
                } else {
                    to_reactive(&value)
                }
            }
            value => value,
        }
    }

    fn collection_prop(&self, key: &PropKey) -> Value {
        let is_size = matches!(key, PropKey::Name(name) if &**name == "size");
        if is_size && self.kind().is_iterable() {
            return self.size().map_or(Value::Undefined, Value::from);
        }
        self.raw_ref().get_prop(key)
    }

    pub(crate) fn set_with_receiver(&self, key: &PropKey, value: Value, receiver: &Value) -> bool {
        if self.kind().is_collection() {
            return self.raw_ref().set_with_receiver(key, value, receiver);
        }
        if self.is_readonly() {
            diagnostics::emit(Diagnostic::ReadonlySet { key: key.to_string() });
            return true;
        }

        let raw = self.raw_ref();
        let mut old = raw.get_prop(key);
        if let Value::Signal(signal) = &old {
            if signal.is_readonly() && !value.is_signal() {
                return false;
            }
        }
        let mut value = value;
        if !self.is_shallow() {
            if !is_shallow(&value) && !is_readonly(&value) {
                old = to_raw(&old);
                value = to_raw(&value);
            }
            if raw.kind() != ObjectKind::Array && !value.is_signal() {
                if let Value::Signal(signal) = &old {
                    signal.set(value);
                    return true;
                }
            }
        }

        let had_key = match key.index() {
            Some(index) if raw.kind() == ObjectKind::Array => raw.length().is_some_and(|len| (index as usize) < len),
            _ => raw.has_own(key),
        };
        let result = raw.set_with_receiver(key, value.clone(), receiver);
        // A write that arrived through the prototype chain belongs to the
        // receiver, not to this target.
        let lands_here = matches!(to_raw(receiver), Value::Object(target) if target.ptr_eq(raw));
        if result && lands_here {
            let dep_key = DepKey::Prop(key.clone());
            if !had_key {
                trigger(raw, TriggerOp::Add, Some(&dep_key), Some(&value), None, None);
            } else if has_changed(&value, &old) {
                trigger(raw, TriggerOp::Set, Some(&dep_key), Some(&value), Some(&old), None);
            }
        }
        result
    }

    pub(crate) fn delete_prop(&self, key: &PropKey) -> bool {
        if self.kind().is_collection() {
            return self.raw_ref().delete_prop(key);
        }
        if self.is_readonly() {
            diagnostics::emit(Diagnostic::ReadonlyDelete { key: key.to_string() });
            return true;
        }
        let raw = self.raw_ref();
        let had_key = raw.has_own(key);
        let old = raw.get_prop(key);
        let result = raw.delete_prop(key);
        if result && had_key {
            trigger(raw, TriggerOp::Delete, Some(&DepKey::Prop(key.clone())), None, Some(&old), None);
        }
        result
    }

    pub(crate) fn has_prop(&self, key: &PropKey) -> bool {
        if self.kind().is_collection() || self.is_readonly() {
            return self.target().has_prop(key);
        }
        let result = self.raw_ref().has_prop(key);
        // Only protocol symbols and markers skip `has` tracking.
        if key.is_trackable() || matches!(key, PropKey::Name(_)) {
            track(self.raw_ref(), TrackOp::Has, DepKey::Prop(key.clone()));
        }
        result
    }

    pub(crate) fn own_keys(&self) -> Vec<PropKey> {
        if self.kind().is_collection() || self.is_readonly() {
            return self.target().own_keys();
        }
        let raw = self.raw_ref();
        let key = match raw.kind() {
            ObjectKind::Array => DepKey::Prop(PropKey::length()),
            _ => DepKey::Iterate,
        };
        track(raw, TrackOp::Iterate, key);
        raw.own_keys()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::diagnostics::{self, Diagnostic};
    use crate::observe::{is_reactive, is_readonly, reactive, readonly, shallow_reactive, to_raw};
    use crate::reactive::{effect, Runtime, Signal};
    use crate::value::{PropKey, RawObject, Symbol, Value};

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn nested_objects_are_wrapped_lazily() {
        let nested = RawObject::plain();
        let raw = RawObject::from_props([("nested", Value::from(&nested))]);
        let state = reactive(&raw.clone().into());

        let read = state.get("nested");
        assert!(is_reactive(&read));
        assert_eq!(to_raw(&read), Value::from(&nested));
        // Stored data is untouched.
        assert_eq!(raw.get("nested"), Value::from(&nested));
    }

    #[test]
    fn markers_answer_introspection() {
        let state = readonly(&RawObject::plain().into());
        assert_eq!(state.get(PropKey::Marker(crate::value::Marker::IsReadonly)), Value::Bool(true));
        assert_eq!(state.get(PropKey::Marker(crate::value::Marker::IsReactive)), Value::Bool(false));
    }

    #[test]
    fn signals_unwrap_except_at_array_indices() {
        let signal = Signal::new(1);
        let object = reactive(&RawObject::from_props([("count", Value::from(&signal))]).into());
        assert_eq!(object.get("count"), Value::from(1));

        let array = reactive(&RawObject::from_values([Value::from(&signal)]).into());
        assert!(array.get(0).is_signal());
    }

    #[test]
    fn writing_a_plain_value_over_a_signal_writes_into_it() {
        let signal = Signal::new(1);
        let object = reactive(&RawObject::from_props([("count", Value::from(&signal))]).into());
        assert!(object.set("count", 5));
        assert_eq!(signal.get_untracked(), Value::from(5));
        assert!(to_raw(&object).get("count").is_signal());
    }

    #[test]
    fn readonly_signal_property_refuses_plain_write() {
        let signal = Signal::readonly(1);
        let object = reactive(&RawObject::from_props([("count", Value::from(&signal))]).into());
        assert!(!object.set("count", 2));
        assert_eq!(signal.get_untracked(), Value::from(1));
    }

    #[test]
    fn same_value_write_does_not_trigger() {
        let state = reactive(&RawObject::from_props([("foo", 1)]).into());
        let (runs, runs_in) = counter();
        let state_in = state.clone();
        let _c = effect(move || {
            state_in.get("foo");
            runs_in.set(runs_in.get() + 1);
        });

        state.set("foo", 1);
        assert_eq!(runs.get(), 1);
        state.set("foo", f64::NAN);
        state.set("foo", f64::NAN);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn adding_a_key_triggers_key_enumeration() {
        let state = reactive(&RawObject::plain().into());
        let keys = Rc::new(RefCell::new(Vec::new()));
        let (state_in, keys_in) = (state.clone(), keys.clone());
        let _c = effect(move || {
            *keys_in.borrow_mut() = state_in.own_keys();
        });

        state.set("a", 1);
        assert_eq!(*keys.borrow(), vec![PropKey::from("a")]);
        state.delete("a");
        assert!(keys.borrow().is_empty());
    }

    #[test]
    fn has_is_tracked() {
        let state = reactive(&RawObject::plain().into());
        let seen = Rc::new(Cell::new(false));
        let (state_in, seen_in) = (state.clone(), seen.clone());
        let _c = effect(move || seen_in.set(state_in.has("a")));

        assert!(!seen.get());
        state.set("a", 1);
        assert!(seen.get());
    }

    #[test]
    fn well_known_symbols_are_not_tracked() {
        let raw = RawObject::plain();
        let state = reactive(&raw.clone().into());
        let state_in = state.clone();
        let _c = effect(move || {
            state_in.get(Symbol::Iterator);
        });
        assert!(!Runtime::is_observed(&raw));
    }

    #[test]
    fn proto_reads_are_not_tracked() {
        let raw = RawObject::from_props([("__proto__", 1)]);
        let state = reactive(&raw.clone().into());
        let state_in = state.clone();
        let _c = effect(move || {
            state_in.get("__proto__");
        });
        assert!(!Runtime::is_observed(&raw));
    }

    #[test]
    fn shallow_wrapper_returns_nested_objects_raw() {
        let nested = RawObject::plain();
        let state = shallow_reactive(&RawObject::from_props([("nested", Value::from(&nested))]).into());
        assert_eq!(state.get("nested"), Value::from(&nested));
    }

    #[test]
    fn readonly_rejects_set_and_delete() {
        let raw = RawObject::from_props([("a", 1)]);
        let view = readonly(&raw.clone().into());

        let ((set, deleted), captured) = diagnostics::capture(|| (view.set("a", 2), view.delete("a")));
        assert!(set && deleted);
        assert_eq!(view.get("a"), Value::from(1));
        assert_eq!(
            captured,
            vec![
                Diagnostic::ReadonlySet { key: "a".into() },
                Diagnostic::ReadonlyDelete { key: "a".into() },
            ]
        );
    }

    #[test]
    fn readonly_nested_reads_are_readonly() {
        let raw = RawObject::from_props([("nested", RawObject::plain())]);
        let view = readonly(&raw.into());
        assert!(is_readonly(&view.get("nested")));
    }

    #[test]
    fn readonly_view_of_reactive_is_tracked() {
        let state = reactive(&RawObject::from_props([("a", 1)]).into());
        let view = readonly(&state);
        let seen = Rc::new(Cell::new(0.0));
        let (view_in, seen_in) = (view.clone(), seen.clone());
        let _c = effect(move || seen_in.set(view_in.get("a").as_number().unwrap_or_default()));

        state.set("a", 2);
        assert_eq!(seen.get(), 2.0);
    }

    #[test]
    fn writes_through_a_reactive_prototype_trigger_only_the_receiver() {
        let parent_raw = RawObject::from_props([("foo", 1)]);
        let parent = reactive(&parent_raw.clone().into());
        let child_raw = RawObject::with_prototype(parent.clone());
        let child = reactive(&child_raw.clone().into());

        let (parent_runs, parent_runs_in) = counter();
        let parent_in = parent.clone();
        let _p = effect(move || {
            parent_in.get("foo");
            parent_runs_in.set(parent_runs_in.get() + 1);
        });

        assert!(child.set("foo", 2));
        assert_eq!(parent_raw.get("foo"), Value::from(1));
        assert_eq!(child_raw.get("foo"), Value::from(2));
        assert_eq!(parent_runs.get(), 1);
    }

    #[test]
    fn array_length_shrink_invalidates_out_of_range_indices() {
        let array = reactive(&RawObject::from_values([1, 2, 3]).into());
        let seen = Rc::new(RefCell::new(Value::Undefined));
        let (array_in, seen_in) = (array.clone(), seen.clone());
        let _c = effect(move || *seen_in.borrow_mut() = array_in.get(2));

        assert_eq!(*seen.borrow(), Value::from(3));
        array.set("length", 1);
        assert!(seen.borrow().is_undefined());
    }
}
