//! Raw Objects
//!
//! Plain objects, arrays and keyed/set collections as reference-counted
//! handles. A `RawObject` is never observed on its own: reads and writes on
//! it go straight to its data. Wrapping it with one of the functions in
//! [`crate::observe`] produces a [`Proxy`](crate::observe::Proxy) that
//! forwards to it while emitting track and trigger events.
//!
//! # Identity
//!
//! Every object gets a [`TargetId`] at creation. When the last handle is
//! dropped the runtime forgets every dependency recorded against that id.
//!
//! # Prototypes
//!
//! Any object may carry a prototype (a raw object or a proxy). Reads fall
//! back along the chain; writes of a key the object does not own are
//! delegated up the chain with the original receiver, so they land on the
//! receiver.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::{EntryKey, PropKey, TargetId, Value};
use crate::error::{Error, Result};
use crate::observe::{self, WeakProxy};
use crate::reactive::{Runtime, WeakSignal};

/// Most holes a single index or `length` write may open in an array.
/// Writes reaching further are refused.
pub const MAX_ARRAY_GAP: usize = 1 << 20;

/// The kind of a raw object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ObjectKind {
    Plain,
    Array,
    Map,
    Set,
    WeakMap,
    WeakSet,
}

impl ObjectKind {
    /// Map, set, or one of their weak counterparts.
    pub fn is_collection(self) -> bool {
        !matches!(self, ObjectKind::Plain | ObjectKind::Array)
    }

    /// Key-value collections.
    pub fn is_keyed(self) -> bool {
        matches!(self, ObjectKind::Map | ObjectKind::WeakMap)
    }

    /// Value collections.
    pub fn is_set_like(self) -> bool {
        matches!(self, ObjectKind::Set | ObjectKind::WeakSet)
    }

    pub fn is_weak(self) -> bool {
        matches!(self, ObjectKind::WeakMap | ObjectKind::WeakSet)
    }

    /// Collections that can be sized and iterated.
    pub fn is_iterable(self) -> bool {
        matches!(self, ObjectKind::Map | ObjectKind::Set)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectKind::Plain => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Map => "Map",
            ObjectKind::Set => "Set",
            ObjectKind::WeakMap => "WeakMap",
            ObjectKind::WeakSet => "WeakSet",
        })
    }
}

/// Extensibility state of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Integrity {
    Extensible,
    /// No new properties; existing ones stay writable and deletable.
    NonExtensible,
    /// No new properties, no writes, no deletes.
    Frozen,
}

/// Weak handle to a reference value, used for weak collection keys.
#[derive(Clone)]
pub(crate) enum WeakValue {
    Object(Weak<ObjectInner>),
    Proxy(WeakProxy),
    Signal(WeakSignal),
}

impl WeakValue {
    pub(crate) fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Object(object) => Some(WeakValue::Object(Rc::downgrade(&object.inner))),
            Value::Proxy(proxy) => Some(WeakValue::Proxy(proxy.downgrade())),
            Value::Signal(signal) => Some(WeakValue::Signal(signal.downgrade())),
            _ => None,
        }
    }

    pub(crate) fn upgrade(&self) -> Option<Value> {
        match self {
            WeakValue::Object(weak) => weak.upgrade().map(|inner| Value::Object(RawObject { inner })),
            WeakValue::Proxy(weak) => weak.upgrade().map(Value::Proxy),
            WeakValue::Signal(weak) => weak.upgrade().map(Value::Signal),
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        match self {
            WeakValue::Object(weak) => weak.strong_count() > 0,
            WeakValue::Proxy(weak) => weak.is_alive(),
            WeakValue::Signal(weak) => weak.is_alive(),
        }
    }
}

enum Body {
    Plain,
    Array(Vec<Value>),
    Map(IndexMap<EntryKey, (Value, Value)>),
    Set(IndexMap<EntryKey, Value>),
    WeakMap(IndexMap<EntryKey, (WeakValue, Value)>),
    WeakSet(IndexMap<EntryKey, WeakValue>),
}

struct ObjectData {
    props: IndexMap<PropKey, Value>,
    prototype: Option<Value>,
    body: Body,
}

impl ObjectData {
    fn own(&self, key: &PropKey) -> Option<Value> {
        match (&self.body, key) {
            (Body::Array(items), PropKey::Index(i)) => items.get(*i as usize).cloned(),
            (Body::Array(items), key) if key.is_length() => Some(Value::from(items.len())),
            (Body::Map(entries), PropKey::Name(name)) if &**name == "size" => Some(Value::from(entries.len())),
            (Body::Set(entries), PropKey::Name(name)) if &**name == "size" => Some(Value::from(entries.len())),
            (_, PropKey::Marker(_)) => None,
            _ => self.props.get(key).cloned(),
        }
    }

    fn has_own(&self, key: &PropKey) -> bool {
        match (&self.body, key) {
            (Body::Array(items), PropKey::Index(i)) => (*i as usize) < items.len(),
            (Body::Array(_), key) if key.is_length() => true,
            (_, PropKey::Marker(_)) => false,
            _ => self.props.contains_key(key),
        }
    }

    fn purge_dead_keys(&mut self) {
        match &mut self.body {
            Body::WeakMap(entries) => entries.retain(|_, (key, _)| key.is_alive()),
            Body::WeakSet(entries) => entries.retain(|_, key| key.is_alive()),
            _ => {}
        }
    }
}

pub(crate) struct ObjectInner {
    id: TargetId,
    kind: ObjectKind,
    data: RefCell<ObjectData>,
    skip: Cell<bool>,
    integrity: Cell<Integrity>,
}

impl Drop for ObjectInner {
    fn drop(&mut self) {
        Runtime::forget(self.id);
    }
}

/// A handle to a raw object.
///
/// Clones share the same object. Equality is identity.
#[derive(Clone)]
pub struct RawObject {
    inner: Rc<ObjectInner>,
}

impl RawObject {
    /// Create an empty object of the given kind.
    pub fn new(kind: ObjectKind) -> Self {
        let body = match kind {
            ObjectKind::Plain => Body::Plain,
            ObjectKind::Array => Body::Array(Vec::new()),
            ObjectKind::Map => Body::Map(IndexMap::new()),
            ObjectKind::Set => Body::Set(IndexMap::new()),
            ObjectKind::WeakMap => Body::WeakMap(IndexMap::new()),
            ObjectKind::WeakSet => Body::WeakSet(IndexMap::new()),
        };
        Self {
            inner: Rc::new(ObjectInner {
                id: TargetId::next(),
                kind,
                data: RefCell::new(ObjectData {
                    props: IndexMap::new(),
                    prototype: None,
                    body,
                }),
                skip: Cell::new(false),
                integrity: Cell::new(Integrity::Extensible),
            }),
        }
    }

    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    pub fn array() -> Self {
        Self::new(ObjectKind::Array)
    }

    pub fn map() -> Self {
        Self::new(ObjectKind::Map)
    }

    pub fn new_set() -> Self {
        Self::new(ObjectKind::Set)
    }

    pub fn weak_map() -> Self {
        Self::new(ObjectKind::WeakMap)
    }

    pub fn weak_set() -> Self {
        Self::new(ObjectKind::WeakSet)
    }

    /// Create a plain object from key-value pairs.
    pub fn from_props<K, V>(props: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<PropKey>,
        V: Into<Value>,
    {
        let object = Self::plain();
        {
            let mut data = object.inner.data.borrow_mut();
            for (key, value) in props {
                data.props.insert(key.into(), value.into());
            }
        }
        object
    }

    /// Create an array from its elements.
    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let object = Self::array();
        if let Body::Array(items) = &mut object.inner.data.borrow_mut().body {
            items.extend(values.into_iter().map(Into::into));
        }
        object
    }

    /// Create a map from key-value pairs. Later duplicates overwrite earlier ones.
    pub fn map_from<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
    {
        let object = Self::map();
        if let Body::Map(map) = &mut object.inner.data.borrow_mut().body {
            for (key, value) in entries {
                let key = key.into();
                match map.get_mut(&key.entry_key()) {
                    Some(slot) => slot.1 = value.into(),
                    None => {
                        map.insert(key.entry_key(), (key, value.into()));
                    }
                }
            }
        }
        object
    }

    /// Create a set from values. Duplicates are dropped.
    pub fn set_from<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let object = Self::new_set();
        if let Body::Set(set) = &mut object.inner.data.borrow_mut().body {
            for value in values {
                let value = value.into();
                set.entry(value.entry_key()).or_insert(value);
            }
        }
        object
    }

    /// Create a plain object whose prototype is `prototype`.
    pub fn with_prototype(prototype: impl Into<Value>) -> Self {
        let object = Self::plain();
        object.set_prototype(Some(prototype.into()));
        object
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn kind(&self) -> ObjectKind {
        self.inner.kind
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `mark_raw` excluded this object from wrapping.
    pub fn is_skipped(&self) -> bool {
        self.inner.skip.get()
    }

    pub(crate) fn mark_skip(&self) {
        self.inner.skip.set(true);
    }

    pub fn integrity(&self) -> Integrity {
        self.inner.integrity.get()
    }

    pub fn is_extensible(&self) -> bool {
        self.integrity() == Integrity::Extensible
    }

    pub fn is_frozen(&self) -> bool {
        self.integrity() == Integrity::Frozen
    }

    /// Forbid new properties.
    pub fn prevent_extensions(&self) {
        if self.is_extensible() {
            self.inner.integrity.set(Integrity::NonExtensible);
        }
    }

    /// Forbid new properties, writes and deletes. Collection entries are unaffected.
    pub fn freeze(&self) {
        self.inner.integrity.set(Integrity::Frozen);
    }

    pub fn prototype(&self) -> Option<Value> {
        self.inner.data.borrow().prototype.clone()
    }

    /// Replace the prototype.
    ///
    /// Returns `false` if the object is not extensible, the prototype is not
    /// an object, or the change would create a cycle.
    pub fn set_prototype(&self, prototype: Option<Value>) -> bool {
        if !self.is_extensible() {
            return false;
        }
        if let Some(proto) = &prototype {
            if !proto.is_object() {
                return false;
            }
            let mut cursor = Some(proto.clone());
            while let Some(link) = cursor {
                let Value::Object(raw) = observe::to_raw(&link) else {
                    break;
                };
                if raw.ptr_eq(self) {
                    return false;
                }
                cursor = raw.prototype();
            }
        }
        self.inner.data.borrow_mut().prototype = prototype;
        true
    }

    /// Array length, if this is an array.
    pub fn length(&self) -> Option<usize> {
        match &self.inner.data.borrow().body {
            Body::Array(items) => Some(items.len()),
            _ => None,
        }
    }

    /// Read a property, falling back along the prototype chain.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        self.get_prop(&key.into())
    }

    /// Write a property with this object as receiver.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        let receiver = Value::Object(self.clone());
        self.set_with_receiver(&key.into(), value.into(), &receiver)
    }

    /// Append to an array.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        self.require("push", |kind| kind == ObjectKind::Array)?;
        let len = self.length().unwrap_or_default();
        if self.define_own(&PropKey::from(len), value.into()) {
            Ok(len + 1)
        } else {
            Ok(len)
        }
    }

    // ------------------------------------------------------------------------
    // Property protocol
    // ------------------------------------------------------------------------

    pub(crate) fn get_prop(&self, key: &PropKey) -> Value {
        let prototype = {
            let data = self.inner.data.borrow();
            if let Some(value) = data.own(key) {
                return value;
            }
            data.prototype.clone()
        };
        match prototype {
            Some(prototype) if !key.is_marker() => prototype.get_prop(key),
            _ => Value::Undefined,
        }
    }

    pub(crate) fn has_own(&self, key: &PropKey) -> bool {
        self.inner.data.borrow().has_own(key)
    }

    pub(crate) fn has_prop(&self, key: &PropKey) -> bool {
        let prototype = {
            let data = self.inner.data.borrow();
            if data.has_own(key) {
                return true;
            }
            data.prototype.clone()
        };
        match prototype {
            Some(prototype) if !key.is_marker() => prototype.has_prop(key),
            _ => false,
        }
    }

    pub(crate) fn set_with_receiver(&self, key: &PropKey, value: Value, receiver: &Value) -> bool {
        let (owned, prototype) = {
            let data = self.inner.data.borrow();
            (data.has_own(key), data.prototype.clone())
        };
        if !owned {
            if let Some(prototype) = prototype {
                return prototype.set_with_receiver(key, value, receiver);
            }
        }
        match observe::to_raw(receiver) {
            Value::Object(target) => target.define_own(key, value),
            _ => false,
        }
    }

    /// Create or overwrite an own property.
    pub(crate) fn define_own(&self, key: &PropKey, value: Value) -> bool {
        if key.is_marker() {
            return false;
        }
        let integrity = self.integrity();
        if integrity == Integrity::Frozen {
            return false;
        }
        let mut data = self.inner.data.borrow_mut();
        if !data.has_own(key) && integrity != Integrity::Extensible {
            return false;
        }
        let ObjectData { props, body, .. } = &mut *data;
        let displaced: Vec<Value> = match (body, key) {
            (Body::Array(items), PropKey::Index(i)) => {
                let i = *i as usize;
                if i > items.len() + MAX_ARRAY_GAP {
                    return false;
                }
                if i >= items.len() {
                    items.resize(i, Value::Undefined);
                    items.push(value);
                    Vec::new()
                } else {
                    vec![std::mem::replace(&mut items[i], value)]
                }
            }
            (Body::Array(items), key) if key.is_length() => {
                let Some(len) = array_length(&value).filter(|len| *len <= items.len() + MAX_ARRAY_GAP) else {
                    return false;
                };
                let removed = if len < items.len() { items.split_off(len) } else { Vec::new() };
                items.resize(len, Value::Undefined);
                removed
            }
            _ => props.insert(key.clone(), value).into_iter().collect(),
        };
        drop(data);
        drop(displaced);
        true
    }

    pub(crate) fn delete_prop(&self, key: &PropKey) -> bool {
        if !self.has_own(key) {
            return true;
        }
        if self.is_frozen() || (key.is_length() && self.kind() == ObjectKind::Array) {
            return false;
        }
        let mut data = self.inner.data.borrow_mut();
        let ObjectData { props, body, .. } = &mut *data;
        let removed = match (body, key) {
            (Body::Array(items), PropKey::Index(i)) => Some(std::mem::take(&mut items[*i as usize])),
            _ => props.shift_remove(key),
        };
        drop(data);
        drop(removed);
        true
    }

    /// Own keys: integer indices ascending, then names in insertion order,
    /// then symbols.
    pub(crate) fn own_keys(&self) -> Vec<PropKey> {
        let data = self.inner.data.borrow();
        let mut keys = Vec::with_capacity(data.props.len());
        match &data.body {
            Body::Array(items) => {
                keys.extend((0..items.len()).map(PropKey::from));
                keys.push(PropKey::length());
            }
            _ => {
                let mut indices: Vec<u32> = data.props.keys().filter_map(PropKey::index).collect();
                indices.sort_unstable();
                keys.extend(indices.into_iter().map(PropKey::Index));
            }
        }
        keys.extend(
            data.props
                .keys()
                .filter(|key| matches!(key, PropKey::Name(_)))
                .cloned(),
        );
        keys.extend(
            data.props
                .keys()
                .filter(|key| matches!(key, PropKey::Symbol(_)))
                .cloned(),
        );
        keys
    }

    // ------------------------------------------------------------------------
    // Collection protocol
    // ------------------------------------------------------------------------

    pub(crate) fn require(&self, operation: &'static str, allowed: fn(ObjectKind) -> bool) -> Result<()> {
        if allowed(self.kind()) {
            Ok(())
        } else {
            Err(Error::Unsupported {
                operation,
                kind: self.kind(),
            })
        }
    }

    fn require_key(&self, key: &Value) -> Result<()> {
        if self.kind().is_weak() && WeakValue::new(key).is_none() {
            return Err(Error::InvalidWeakKey {
                kind: self.kind(),
                found: key.type_name(),
            });
        }
        Ok(())
    }

    /// Mapped value (maps) or stored member (sets) for `key`.
    pub(crate) fn entry_lookup(&self, key: &Value) -> Option<Value> {
        let entry_key = key.entry_key();
        match &self.inner.data.borrow().body {
            Body::Map(entries) => entries.get(&entry_key).map(|(_, value)| value.clone()),
            Body::Set(entries) => entries.get(&entry_key).cloned(),
            Body::WeakMap(entries) => entries
                .get(&entry_key)
                .filter(|(key, _)| key.is_alive())
                .map(|(_, value)| value.clone()),
            Body::WeakSet(entries) => entries.get(&entry_key).and_then(WeakValue::upgrade),
            _ => None,
        }
    }

    pub(crate) fn entry_contains(&self, key: &Value) -> bool {
        self.entry_lookup(key).is_some()
    }

    /// Insert into a map. Returns the displaced value.
    pub(crate) fn entry_insert(&self, key: Value, value: Value) -> Result<Option<Value>> {
        self.require("set", ObjectKind::is_keyed)?;
        self.require_key(&key)?;
        let mut data = self.inner.data.borrow_mut();
        data.purge_dead_keys();
        let entry_key = key.entry_key();
        let displaced = match &mut data.body {
            Body::Map(entries) => match entries.get_mut(&entry_key) {
                Some(slot) => Some(std::mem::replace(&mut slot.1, value)),
                None => entries.insert(entry_key, (key, value)).map(|(_, old)| old),
            },
            Body::WeakMap(entries) => {
                let weak = WeakValue::new(&key).ok_or(Error::InvalidWeakKey {
                    kind: ObjectKind::WeakMap,
                    found: key.type_name(),
                })?;
                match entries.get_mut(&entry_key) {
                    Some(slot) => Some(std::mem::replace(&mut slot.1, value)),
                    None => entries.insert(entry_key, (weak, value)).map(|(_, old)| old),
                }
            }
            _ => None,
        };
        Ok(displaced)
    }

    /// Add to a set. Returns whether the value was new.
    pub(crate) fn entry_add(&self, value: Value) -> Result<bool> {
        self.require("add", ObjectKind::is_set_like)?;
        self.require_key(&value)?;
        let mut data = self.inner.data.borrow_mut();
        data.purge_dead_keys();
        let entry_key = value.entry_key();
        let added = match &mut data.body {
            Body::Set(entries) => {
                if entries.contains_key(&entry_key) {
                    false
                } else {
                    entries.insert(entry_key, value);
                    true
                }
            }
            Body::WeakSet(entries) => match (entries.contains_key(&entry_key), WeakValue::new(&value)) {
                (false, Some(weak)) => {
                    entries.insert(entry_key, weak);
                    true
                }
                _ => false,
            },
            _ => false,
        };
        Ok(added)
    }

    /// Remove an entry. Returns the removed value (maps) or member (sets).
    pub(crate) fn entry_remove(&self, key: &Value) -> Option<Value> {
        let entry_key = key.entry_key();
        let mut data = self.inner.data.borrow_mut();
        data.purge_dead_keys();
        match &mut data.body {
            Body::Map(entries) => entries.shift_remove(&entry_key).map(|(_, value)| value),
            Body::Set(entries) => entries.shift_remove(&entry_key),
            Body::WeakMap(entries) => entries.shift_remove(&entry_key).map(|(_, value)| value),
            Body::WeakSet(entries) => entries.shift_remove(&entry_key).and_then(|key| key.upgrade()),
            _ => None,
        }
    }

    /// Remove every entry. Returns how many there were.
    pub(crate) fn entry_clear(&self) -> usize {
        let mut data = self.inner.data.borrow_mut();
        let removed = match &mut data.body {
            Body::Map(entries) => std::mem::take(entries).len(),
            Body::Set(entries) => std::mem::take(entries).len(),
            _ => 0,
        };
        removed
    }

    pub(crate) fn entry_count(&self) -> usize {
        match &self.inner.data.borrow().body {
            Body::Map(entries) => entries.len(),
            Body::Set(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Snapshot of `(key, value)` pairs in insertion order. Sets yield each
    /// member as both key and value.
    pub(crate) fn entry_pairs(&self) -> Vec<(Value, Value)> {
        match &self.inner.data.borrow().body {
            Body::Map(entries) => entries.values().cloned().collect(),
            Body::Set(entries) => entries.values().map(|value| (value.clone(), value.clone())).collect(),
            _ => Vec::new(),
        }
    }

    /// A new collection of the same kind holding the same entries.
    pub(crate) fn shallow_copy(&self) -> RawObject {
        let copy = RawObject::new(self.kind());
        {
            let source = self.inner.data.borrow();
            let mut target = copy.inner.data.borrow_mut();
            target.body = match &source.body {
                Body::Plain => Body::Plain,
                Body::Array(items) => Body::Array(items.clone()),
                Body::Map(entries) => Body::Map(entries.clone()),
                Body::Set(entries) => Body::Set(entries.clone()),
                Body::WeakMap(entries) => Body::WeakMap(entries.clone()),
                Body::WeakSet(entries) => Body::WeakSet(entries.clone()),
            };
            target.props = source.props.clone();
        }
        copy
    }

    // ------------------------------------------------------------------------
    // Public collection API
    // ------------------------------------------------------------------------

    /// Value mapped to `key`, or `Undefined`.
    pub fn get_entry(&self, key: impl Into<Value>) -> Result<Value> {
        self.require("get", ObjectKind::is_keyed)?;
        Ok(self.entry_lookup(&key.into()).unwrap_or_default())
    }

    pub fn has_entry(&self, key: impl Into<Value>) -> Result<bool> {
        self.require("has", ObjectKind::is_collection)?;
        Ok(self.entry_contains(&key.into()))
    }

    pub fn add(&self, value: impl Into<Value>) -> Result<()> {
        self.entry_add(value.into()).map(drop)
    }

    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        self.entry_insert(key.into(), value.into()).map(drop)
    }

    /// Remove an entry. Returns whether it existed.
    pub fn remove(&self, key: impl Into<Value>) -> Result<bool> {
        self.require("delete", ObjectKind::is_collection)?;
        let key = key.into();
        let existed = self.entry_contains(&key);
        self.entry_remove(&key);
        Ok(existed)
    }

    pub fn clear(&self) -> Result<()> {
        self.require("clear", ObjectKind::is_iterable)?;
        self.entry_clear();
        Ok(())
    }

    pub fn size(&self) -> Result<usize> {
        self.require("size", ObjectKind::is_iterable)?;
        Ok(self.entry_count())
    }

    pub fn keys(&self) -> Result<Vec<Value>> {
        self.require("keys", ObjectKind::is_iterable)?;
        Ok(self.entry_pairs().into_iter().map(|(key, _)| key).collect())
    }

    pub fn values(&self) -> Result<Vec<Value>> {
        self.require("values", ObjectKind::is_iterable)?;
        Ok(self.entry_pairs().into_iter().map(|(_, value)| value).collect())
    }

    pub fn entries(&self) -> Result<Vec<(Value, Value)>> {
        self.require("entries", ObjectKind::is_iterable)?;
        Ok(self.entry_pairs())
    }

    /// Call `f(value, key)` for each entry.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) -> Result<()> {
        self.require("forEach", ObjectKind::is_iterable)?;
        for (key, value) in self.entry_pairs() {
            f(value, key);
        }
        Ok(())
    }
}

fn array_length(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) if *n >= 0.0 && n.fract() == 0.0 && *n < f64::from(u32::MAX) => Some(*n as usize),
        _ => None,
    }
}

impl PartialEq for RawObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RawObject {}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawObject")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("skip", &self.is_skipped())
            .field("integrity", &self.integrity())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_object_keys_keep_order_with_indices_first() {
        let object = RawObject::from_props([("b", 1), ("a", 2)]);
        object.set(7u32, 3);
        object.set(2u32, 4);

        let keys: Vec<String> = object.own_keys().iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["2", "7", "b", "a"]);
    }

    #[test]
    fn array_writes_past_end_fill_with_undefined() {
        let array = RawObject::from_values([1, 2]);
        assert!(array.set(4u32, 5));
        assert_eq!(array.length(), Some(5));
        assert!(array.get(2u32).is_undefined());
        assert_eq!(array.get("length"), Value::from(5));

        assert!(array.set("length", 1));
        assert_eq!(array.length(), Some(1));
        assert!(!array.set("length", -1));
    }

    #[test]
    fn distant_array_writes_are_refused() {
        let array = RawObject::from_values([1]);
        assert!(!array.set(4_000_000_000u32, 1));
        assert!(!array.set("length", 4_000_000_000u32));
        assert_eq!(array.length(), Some(1));

        assert!(array.set(1 + MAX_ARRAY_GAP, 2));
        assert_eq!(array.length(), Some(2 + MAX_ARRAY_GAP));
    }

    #[test]
    fn frozen_objects_refuse_writes_and_deletes() {
        let object = RawObject::from_props([("a", 1)]);
        object.freeze();
        assert!(!object.set("a", 2));
        assert!(!object.set("b", 2));
        assert!(!Value::from(&object).delete("a"));
        assert_eq!(object.get("a"), Value::from(1));
    }

    #[test]
    fn non_extensible_objects_allow_updates_only() {
        let object = RawObject::from_props([("a", 1)]);
        object.prevent_extensions();
        assert!(object.set("a", 2));
        assert!(!object.set("b", 2));
        assert!(Value::from(&object).delete("a"));
    }

    #[test]
    fn writes_through_prototype_land_on_receiver() {
        let parent = RawObject::from_props([("inherited", 1)]);
        let child = RawObject::with_prototype(&parent);

        assert_eq!(child.get("inherited"), Value::from(1));
        assert!(child.set("inherited", 2));
        assert_eq!(child.get("inherited"), Value::from(2));
        assert_eq!(parent.get("inherited"), Value::from(1));
    }

    #[test]
    fn prototype_cycles_are_rejected() {
        let a = RawObject::plain();
        let b = RawObject::with_prototype(&a);
        assert!(!a.set_prototype(Some(Value::from(&b))));
        assert!(!a.set_prototype(Some(Value::from(&a))));
    }

    #[test]
    fn map_entries_use_same_value_zero() {
        let map = RawObject::map();
        map.insert(0.0, "zero").unwrap();
        assert_eq!(map.get_entry(-0.0).unwrap(), Value::from("zero"));
        map.insert(f64::NAN, "nan").unwrap();
        assert!(map.has_entry(f64::NAN).unwrap());
        assert_eq!(map.size().unwrap(), 2);
    }

    #[test]
    fn collection_operations_check_kind() {
        let set = RawObject::new_set();
        assert!(matches!(
            set.insert(1, 2),
            Err(Error::Unsupported { operation: "set", kind: ObjectKind::Set })
        ));
        assert!(RawObject::plain().size().is_err());
        assert!(RawObject::weak_map().size().is_err());
    }

    #[test]
    fn weak_collections_reject_primitive_keys() {
        let weak = RawObject::weak_map();
        assert!(matches!(weak.insert(1, 2), Err(Error::InvalidWeakKey { .. })));
        assert!(!weak.has_entry(1).unwrap());
    }

    #[test]
    fn weak_entries_vanish_with_their_key() {
        let weak = RawObject::weak_set();
        let key = RawObject::plain();
        weak.add(&key).unwrap();
        assert!(weak.has_entry(&key).unwrap());

        let stale = WeakValue::new(&Value::from(&key)).unwrap();
        drop(key);
        assert!(!stale.is_alive());
        assert!(stale.upgrade().is_none());
    }
}
