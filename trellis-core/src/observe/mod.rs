//! Observation Layer
//!
//! Wrappers that turn reads and writes on raw objects into track and
//! trigger events.
//!
//! # Flavors
//!
//! | Function             | Tracks reads | Writes            | Nested objects  |
//! |----------------------|--------------|-------------------|-----------------|
//! | [`reactive`]         | yes          | trigger           | wrapped reactive|
//! | [`shallow_reactive`] | yes          | trigger           | returned raw    |
//! | [`readonly`]         | no           | rejected, warned  | wrapped readonly|
//! | [`shallow_readonly`] | no           | rejected, warned  | returned raw    |
//!
//! A readonly wrapper over a reactive one forwards to it, so reads through
//! the readonly view are still tracked by the inner wrapper.
//!
//! # Facade
//!
//! There is no transparent interception: every access must go through the
//! wrapper's methods ([`Value::get`], [`Value::set`], the array methods on
//! [`Proxy`], the collection methods on [`Proxy`]). Writing to the raw
//! object directly is invisible to the runtime.
//!
//! # Identity
//!
//! Each flavor keeps an identity map from target to wrapper, so wrapping the
//! same object twice yields the same wrapper for as long as some handle to
//! that wrapper is alive.

mod array;
mod base;
mod collection;
mod proxy;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Weak;

use tracing::debug;

pub use collection::{CollectionIter, Iterated};
pub use proxy::{Flavor, Proxy};

pub(crate) use proxy::WeakProxy;

use crate::value::{TargetId, Value};
use proxy::ProxyInner;

type IdentityMap = HashMap<TargetId, Weak<ProxyInner>>;

thread_local! {
    static IDENTITY_MAPS: RefCell<[IdentityMap; 4]> = RefCell::new(Default::default());
}

fn lookup(flavor: Flavor, target: TargetId) -> Option<Proxy> {
    IDENTITY_MAPS.with(|maps| {
        maps.borrow()[flavor.slot()]
            .get(&target)
            .and_then(Weak::upgrade)
            .map(Proxy::from_inner)
    })
}

fn remember(flavor: Flavor, target: TargetId, proxy: &Proxy) {
    IDENTITY_MAPS.with(|maps| {
        maps.borrow_mut()[flavor.slot()].insert(target, proxy.downgrade().0);
    });
}

/// Drop the identity entry of a wrapper that is being destroyed.
pub(crate) fn release(flavor: Flavor, target: TargetId) {
    let _ = IDENTITY_MAPS.try_with(|maps| {
        if let Ok(mut maps) = maps.try_borrow_mut() {
            let map = &mut maps[flavor.slot()];
            if map.get(&target).is_some_and(|weak| weak.strong_count() == 0) {
                map.remove(&target);
            }
        }
    });
}

/// Wrap `target` with `flavor`, or return it unchanged.
fn create(target: &Value, flavor: Flavor) -> Value {
    let raw = match target {
        Value::Object(raw) => raw.clone(),
        Value::Proxy(proxy) => {
            // Only readonly may wrap a mutable wrapper.
            if !(flavor.is_readonly() && !proxy.flavor().is_readonly()) {
                return target.clone();
            }
            proxy.raw()
        }
        _ => return target.clone(),
    };
    let Some(target_id) = target.target_id() else {
        return target.clone();
    };
    if let Some(existing) = lookup(flavor, target_id) {
        return Value::Proxy(existing);
    }
    if raw.is_skipped() || !raw.is_extensible() {
        return target.clone();
    }
    let proxy = Proxy::new(target, raw, flavor);
    remember(flavor, target_id, &proxy);
    debug!(proxy = %proxy.id(), target = %target_id, ?flavor, "wrap");
    Value::Proxy(proxy)
}

/// Deep mutable wrapper: reads are tracked, writes trigger, nested objects
/// are wrapped on read.
///
/// Returns non-objects, readonly wrappers, and objects flagged with
/// [`mark_raw`] unchanged.
pub fn reactive(target: &Value) -> Value {
    create(target, Flavor::Reactive)
}

/// Mutable wrapper that only observes the first level.
pub fn shallow_reactive(target: &Value) -> Value {
    create(target, Flavor::ShallowReactive)
}

/// Deep readonly wrapper: writes and deletes are rejected with a
/// diagnostic.
pub fn readonly(target: &Value) -> Value {
    create(target, Flavor::Readonly)
}

/// Readonly wrapper that only guards the first level.
pub fn shallow_readonly(target: &Value) -> Value {
    create(target, Flavor::ShallowReadonly)
}

/// Whether `value` is a mutable wrapper, or a readonly wrapper over one.
pub fn is_reactive(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) if proxy.flavor().is_readonly() => is_reactive(&proxy.target()),
        Value::Proxy(_) => true,
        _ => false,
    }
}

/// Whether `value` is a readonly wrapper or a readonly signal.
pub fn is_readonly(value: &Value) -> bool {
    match value {
        Value::Proxy(proxy) => proxy.flavor().is_readonly(),
        Value::Signal(signal) => signal.is_readonly(),
        _ => false,
    }
}

pub fn is_shallow(value: &Value) -> bool {
    value
        .as_proxy()
        .is_some_and(|proxy| proxy.flavor().is_shallow())
}

pub fn is_proxy(value: &Value) -> bool {
    is_reactive(value) || is_readonly(value)
}

/// Unwrap every wrapper layer.
pub fn to_raw(value: &Value) -> Value {
    match value {
        Value::Proxy(proxy) => Value::Object(proxy.raw()),
        _ => value.clone(),
    }
}

/// Exclude an object from wrapping, permanently.
///
/// Wrappers are returned unchanged.
pub fn mark_raw(value: &Value) -> Value {
    if let Value::Object(raw) = value {
        raw.mark_skip();
    }
    value.clone()
}

/// [`reactive`] if `value` is an object.
pub fn to_reactive(value: &Value) -> Value {
    if value.is_object() {
        reactive(value)
    } else {
        value.clone()
    }
}

/// [`readonly`] if `value` is an object.
pub fn to_readonly(value: &Value) -> Value {
    if value.is_object() {
        readonly(value)
    } else {
        value.clone()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RawObject;

    #[test]
    fn wrapping_is_idempotent() {
        let raw = Value::from(RawObject::plain());
        let first = reactive(&raw);
        let second = reactive(&raw);

        assert_eq!(first, second);
        assert_eq!(reactive(&first), first);
        assert_eq!(to_raw(&first), raw);
    }

    #[test]
    fn readonly_wins_over_reactive() {
        let raw = Value::from(RawObject::plain());
        let view = readonly(&raw);
        assert_eq!(reactive(&view), view);

        let observed = reactive(&raw);
        let view_of_observed = readonly(&observed);
        assert_ne!(view_of_observed, view);
        assert!(is_reactive(&view_of_observed));
        assert!(is_readonly(&view_of_observed));
        assert_eq!(to_raw(&view_of_observed), raw);
    }

    #[test]
    fn primitives_pass_through() {
        let value = Value::from(1);
        assert_eq!(reactive(&value), value);
        assert!(!is_proxy(&reactive(&value)));
    }

    #[test]
    fn mark_raw_prevents_wrapping() {
        let raw = mark_raw(&Value::from(RawObject::plain()));
        assert!(raw.as_object().is_some_and(RawObject::is_skipped));
        assert!(!is_proxy(&reactive(&raw)));
    }

    #[test]
    fn non_extensible_objects_are_not_wrapped() {
        let object = RawObject::plain();
        object.freeze();
        let raw = Value::from(object);
        assert_eq!(readonly(&raw), raw);
    }

    #[test]
    fn identity_entry_is_released_with_the_wrapper() {
        let raw = Value::from(RawObject::plain());
        let target = raw.target_id().unwrap();
        let proxy = reactive(&raw);
        assert!(lookup(Flavor::Reactive, target).is_some());

        drop(proxy);
        assert!(lookup(Flavor::Reactive, target).is_none());
        IDENTITY_MAPS.with(|maps| assert!(!maps.borrow()[Flavor::Reactive.slot()].contains_key(&target)));
    }

    #[test]
    fn flavor_introspection() {
        let raw = Value::from(RawObject::plain());
        let shallow = shallow_readonly(&raw);
        assert!(is_shallow(&shallow));
        assert!(is_readonly(&shallow));
        assert!(!is_reactive(&shallow));
        assert!(is_proxy(&shallow));

        let shallow_mutable = shallow_reactive(&raw);
        assert!(is_shallow(&shallow_mutable));
        assert!(is_reactive(&shallow_mutable));
    }
}
