//! Values
//!
//! The dynamic value model of observed object graphs.
//!
//! A [`Value`] is either a primitive, a [`RawObject`] (plain object, array,
//! or keyed/set collection), a [`Proxy`] wrapping an object, or a
//! [`Signal`] boxing a single value. Reference values compare by identity.
//!
//! The `get`/`set`/`delete`/`has`/`own_keys` methods on `Value` are the
//! forwarding layer every wrapper builds on: called on a raw object they
//! operate directly on its data, called on a proxy they go through the
//! proxy's handlers and emit track/trigger events.

mod key;
mod object;
#[cfg(feature = "serde")]
mod json;

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

pub use key::{EntryKey, Marker, PropKey, Symbol};
pub use object::{Integrity, ObjectKind, RawObject, MAX_ARRAY_GAP};

use crate::observe::Proxy;
use crate::reactive::Signal;

/// Stable identity token of an observable target.
///
/// Raw objects, proxies and signals each get one at creation. Tokens are
/// never reused, so a registry entry can never be confused with a later
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh identity token.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A dynamic value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(RawObject),
    Proxy(Proxy),
    Signal(Signal),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this value is an object that can be wrapped.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Proxy(_))
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Value::Signal(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&RawObject> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_proxy(&self) -> Option<&Proxy> {
        match self {
            Value::Proxy(proxy) => Some(proxy),
            _ => None,
        }
    }

    pub fn as_signal(&self) -> Option<&Signal> {
        match self {
            Value::Signal(signal) => Some(signal),
            _ => None,
        }
    }

    /// Truthiness in the usual dynamic-language sense.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Proxy(_) | Value::Signal(_) => true,
        }
    }

    /// Short name of the value's type, for messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Proxy(_) => "proxy",
            Value::Signal(_) => "signal",
        }
    }

    /// Identity token of a reference value.
    pub fn target_id(&self) -> Option<TargetId> {
        match self {
            Value::Object(object) => Some(object.id()),
            Value::Proxy(proxy) => Some(proxy.id()),
            Value::Signal(signal) => Some(signal.id()),
            _ => None,
        }
    }

    /// The collection-key identity of this value.
    pub fn entry_key(&self) -> EntryKey {
        match self {
            Value::Undefined => EntryKey::Undefined,
            Value::Null => EntryKey::Null,
            Value::Bool(b) => EntryKey::Bool(*b),
            Value::Number(n) => EntryKey::number(*n),
            Value::String(s) => EntryKey::String(s.clone()),
            Value::Object(object) => EntryKey::Ref(object.id()),
            Value::Proxy(proxy) => EntryKey::Ref(proxy.id()),
            Value::Signal(signal) => EntryKey::Ref(signal.id()),
        }
    }

    /// SameValue comparison: NaN equals NaN, `+0` differs from `-0`.
    pub fn same_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            _ => self.same_value_zero(other),
        }
    }

    /// SameValueZero comparison: NaN equals NaN, `+0` equals `-0`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => (a.is_nan() && b.is_nan()) || a == b,
            _ => self.strict_equals(other),
        }
    }

    /// Strict equality: NaN never equals anything.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => match (self.target_id(), other.target_id()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    // ------------------------------------------------------------------------
    // Forwarding operations
    // ------------------------------------------------------------------------

    /// Read a property. Non-objects have no properties.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        self.get_prop(&key.into())
    }

    pub(crate) fn get_prop(&self, key: &PropKey) -> Value {
        match self {
            Value::Object(object) => object.get_prop(key),
            Value::Proxy(proxy) => proxy.get_prop(key),
            _ => Value::Undefined,
        }
    }

    /// Write a property. Returns `false` if the write was refused.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        self.set_with_receiver(&key.into(), value.into(), self)
    }

    pub(crate) fn set_with_receiver(&self, key: &PropKey, value: Value, receiver: &Value) -> bool {
        match self {
            Value::Object(object) => object.set_with_receiver(key, value, receiver),
            Value::Proxy(proxy) => proxy.set_with_receiver(key, value, receiver),
            _ => false,
        }
    }

    /// Delete a property. Returns `false` if the delete was refused.
    pub fn delete(&self, key: impl Into<PropKey>) -> bool {
        self.delete_prop(&key.into())
    }

    pub(crate) fn delete_prop(&self, key: &PropKey) -> bool {
        match self {
            Value::Object(object) => object.delete_prop(key),
            Value::Proxy(proxy) => proxy.delete_prop(key),
            _ => false,
        }
    }

    /// Whether the property exists, on the object or its prototype chain.
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        self.has_prop(&key.into())
    }

    pub(crate) fn has_prop(&self, key: &PropKey) -> bool {
        match self {
            Value::Object(object) => object.has_prop(key),
            Value::Proxy(proxy) => proxy.has_prop(key),
            _ => false,
        }
    }

    /// Own property keys, integer indices first.
    pub fn own_keys(&self) -> Vec<PropKey> {
        match self {
            Value::Object(object) => object.own_keys(),
            Value::Proxy(proxy) => proxy.own_keys(),
            _ => Vec::new(),
        }
    }
}

/// Whether `new` differs from `old` under SameValue.
pub fn has_changed(new: &Value, old: &Value) -> bool {
    !new.same_value(old)
}

/// Values compare with SameValueZero, references by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value_zero(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            // Objects can be cyclic; print identity only.
            Value::Object(object) => write!(f, "Object({} {})", object.id(), object.kind()),
            Value::Proxy(proxy) => write!(f, "Proxy({} {:?} of {})", proxy.id(), proxy.flavor(), proxy.raw().id()),
            Value::Signal(signal) => write!(f, "Signal({})", signal.id()),
        }
    }
}

/// String conversion as used in messages.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.is_infinite() => f.write_str(if *n > 0.0 { "Infinity" } else { "-Infinity" }),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Object(object) => write!(f, "[object {}]", object.kind()),
            Value::Proxy(proxy) => write!(f, "[object {}]", proxy.raw().kind()),
            Value::Signal(_) => f.write_str("[object Signal]"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<RawObject> for Value {
    fn from(object: RawObject) -> Self {
        Value::Object(object)
    }
}

impl From<&RawObject> for Value {
    fn from(object: &RawObject) -> Self {
        Value::Object(object.clone())
    }
}

impl From<Proxy> for Value {
    fn from(proxy: Proxy) -> Self {
        Value::Proxy(proxy)
    }
}

impl From<Signal> for Value {
    fn from(signal: Signal) -> Self {
        Value::Signal(signal)
    }
}

impl From<&Signal> for Value {
    fn from(signal: &Signal) -> Self {
        Value::Signal(signal.clone())
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Undefined, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_value_distinguishes_signed_zero() {
        assert!(Value::from(f64::NAN).same_value(&Value::from(f64::NAN)));
        assert!(!Value::from(0.0).same_value(&Value::from(-0.0)));
        assert!(Value::from(0.0).same_value_zero(&Value::from(-0.0)));
        assert!(!Value::from(f64::NAN).strict_equals(&Value::from(f64::NAN)));
    }

    #[test]
    fn has_changed_ignores_nan_rewrites() {
        assert!(!has_changed(&Value::from(f64::NAN), &Value::from(f64::NAN)));
        assert!(has_changed(&Value::from(1), &Value::from(2)));
        assert!(has_changed(&Value::from(1), &Value::from("1")));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = RawObject::plain();
        let b = RawObject::plain();
        assert_eq!(Value::from(&a), Value::from(&a));
        assert_ne!(Value::from(&a), Value::from(&b));
    }

    #[test]
    fn primitives_have_no_properties() {
        let value = Value::from(3);
        assert!(value.get("foo").is_undefined());
        assert!(!value.set("foo", 1));
        assert!(value.own_keys().is_empty());
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("x").is_truthy());
        assert!(Value::from(RawObject::plain()).is_truthy());
    }
}
