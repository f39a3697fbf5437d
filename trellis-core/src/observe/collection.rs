//! Collection methods on wrappers.
//!
//! Every method resolves the raw collection and the raw form of its key
//! argument, since a caller may hold either form. Reads track the key in
//! both forms; writes compare against the prior state and trigger only on
//! an actual change. Values are wrapped as they are handed out.
//!
//! A readonly view over a mutable wrapper forwards its reads to that
//! wrapper, which does the tracking. A lookup that misses still goes
//! through it, so a later insert of the key is observed.

use std::vec;

use super::{to_raw, Flavor, Proxy};
use crate::diagnostics::{self, Diagnostic};
use crate::error::Result;
use crate::reactive::{track, trigger, DepKey, TrackOp, TriggerOp};
use crate::value::{has_changed, ObjectKind, RawObject, Value};

/// Iterator over a snapshot of a wrapped collection.
///
/// Items are wrapped to match the wrapper's flavor as they are yielded.
pub struct CollectionIter<T> {
    items: vec::IntoIter<T>,
    flavor: Flavor,
}

impl<T> CollectionIter<T> {
    fn new(items: Vec<T>, flavor: Flavor) -> Self {
        Self {
            items: items.into_iter(),
            flavor,
        }
    }
}

impl Iterator for CollectionIter<Value> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.items.next().map(|value| self.flavor.wrap(value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl Iterator for CollectionIter<(Value, Value)> {
    type Item = (Value, Value);

    fn next(&mut self) -> Option<(Value, Value)> {
        self.items
            .next()
            .map(|(key, value)| (self.flavor.wrap(key), self.flavor.wrap(value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

/// An item of a collection's default iteration, before wrapping.
#[derive(Debug, Clone)]
pub enum Iterated {
    /// A map entry, yielded as a `[key, value]` array.
    Entry(Value, Value),
    /// A set member, yielded as is.
    Member(Value),
}

impl Iterator for CollectionIter<Iterated> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        let flavor = self.flavor;
        self.items.next().map(|item| match item {
            Iterated::Entry(key, value) => {
                RawObject::from_values([flavor.wrap(key), flavor.wrap(value)]).into()
            }
            Iterated::Member(member) => flavor.wrap(member),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

impl ExactSizeIterator for CollectionIter<Value> {}
impl ExactSizeIterator for CollectionIter<(Value, Value)> {}
impl ExactSizeIterator for CollectionIter<Iterated> {}

/// Key-iteration dependency of `raw`.
fn key_iterate(raw: &RawObject) -> DepKey {
    if raw.kind() == ObjectKind::Map {
        DepKey::MapKeyIterate
    } else {
        DepKey::Iterate
    }
}

/// Warn when `raw` holds both `key` and its raw form as distinct entries.
fn check_identity_keys(raw: &RawObject, key: &Value) {
    let raw_key = to_raw(key);
    if !raw_key.strict_equals(key) && raw.entry_contains(&raw_key) {
        diagnostics::emit(Diagnostic::MixedIdentityKeys { kind: raw.kind() });
    }
}

impl Proxy {
    fn track_key(&self, op: TrackOp, key: &Value, raw_key: &Value) {
        if self.is_readonly() {
            return;
        }
        let raw = self.raw_ref();
        if !key.strict_equals(raw_key) {
            track(raw, op, DepKey::entry(key));
        }
        track(raw, op, DepKey::entry(raw_key));
    }

    fn track_iterate(&self, key: DepKey) {
        if !self.is_readonly() {
            track(self.raw_ref(), TrackOp::Iterate, key);
        }
    }

    /// Snapshot of the entries, read through the forwarded wrapper if any.
    fn pairs(&self) -> Result<Vec<(Value, Value)>> {
        match self.forwarded() {
            Some(inner) => Ok(inner.entries()?.collect()),
            None => Ok(self.raw_ref().entry_pairs()),
        }
    }

    fn readonly_rejection(&self, operation: &'static str, key: Option<&Value>) {
        let key = key.filter(|key| key.is_truthy()).map(ToString::to_string);
        diagnostics::emit(Diagnostic::ReadonlyCollection { operation, key });
    }

    /// Value mapped to `key`, or `Undefined`.
    pub fn get_entry(&self, key: impl Into<Value>) -> Result<Value> {
        let raw = self.raw_ref();
        raw.require("get", ObjectKind::is_keyed)?;
        let key = key.into();
        let raw_key = to_raw(&key);
        self.track_key(TrackOp::Get, &key, &raw_key);

        let found = if raw.entry_contains(&key) {
            Some(&key)
        } else if raw.entry_contains(&raw_key) {
            Some(&raw_key)
        } else {
            None
        };
        match (found, self.forwarded()) {
            (Some(found), Some(inner)) => Ok(self.flavor().wrap(inner.get_entry(found)?)),
            (Some(found), None) => Ok(self.flavor().wrap(raw.entry_lookup(found).unwrap_or_default())),
            (None, Some(inner)) => {
                inner.get_entry(&key)?;
                Ok(Value::Undefined)
            }
            (None, None) => Ok(Value::Undefined),
        }
    }

    /// Whether the collection holds `key`, in either form.
    pub fn has_entry(&self, key: impl Into<Value>) -> Result<bool> {
        let raw = self.raw_ref();
        raw.require("has", ObjectKind::is_collection)?;
        let key = key.into();
        let raw_key = to_raw(&key);
        self.track_key(TrackOp::Has, &key, &raw_key);

        let target_has = |key: &Value| match self.forwarded() {
            Some(inner) => inner.has_entry(key.clone()),
            None => Ok(raw.entry_contains(key)),
        };
        if key.strict_equals(&raw_key) {
            target_has(&key)
        } else {
            Ok(target_has(&key)? || target_has(&raw_key)?)
        }
    }

    /// Number of entries.
    pub fn size(&self) -> Result<usize> {
        self.raw_ref().require("size", ObjectKind::is_iterable)?;
        self.track_iterate(DepKey::Iterate);
        match self.forwarded() {
            Some(inner) => inner.size(),
            None => Ok(self.raw_ref().entry_count()),
        }
    }

    /// Add a member to a set. Adding a present member is a no-op.
    pub fn add(&self, value: impl Into<Value>) -> Result<()> {
        let raw = self.raw_ref();
        raw.require("add", ObjectKind::is_set_like)?;
        let value = value.into();
        if self.is_readonly() {
            self.readonly_rejection("Add", Some(&value));
            return Ok(());
        }
        let value = to_raw(&value);
        if raw.entry_add(value.clone())? {
            trigger(raw, TriggerOp::Add, Some(&DepKey::entry(&value)), Some(&value), None, None);
        }
        Ok(())
    }

    /// Map `key` to `value`.
    pub fn insert(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let raw = self.raw_ref();
        raw.require("set", ObjectKind::is_keyed)?;
        let mut key = key.into();
        if self.is_readonly() {
            self.readonly_rejection("Set", Some(&key));
            return Ok(());
        }
        let value = to_raw(&value.into());
        let mut had_key = raw.entry_contains(&key);
        if had_key {
            check_identity_keys(raw, &key);
        } else {
            key = to_raw(&key);
            had_key = raw.entry_contains(&key);
        }
        let old = raw.entry_lookup(&key).unwrap_or_default();
        raw.entry_insert(key.clone(), value.clone())?;

        let dep_key = DepKey::entry(&key);
        if !had_key {
            trigger(raw, TriggerOp::Add, Some(&dep_key), Some(&value), None, None);
        } else if has_changed(&value, &old) {
            trigger(raw, TriggerOp::Set, Some(&dep_key), Some(&value), Some(&old), None);
        }
        Ok(())
    }

    /// Remove an entry. Returns whether it existed.
    ///
    /// Through a readonly wrapper, always returns `false`.
    pub fn remove(&self, key: impl Into<Value>) -> Result<bool> {
        let raw = self.raw_ref();
        raw.require("delete", ObjectKind::is_collection)?;
        let mut key = key.into();
        if self.is_readonly() {
            self.readonly_rejection("Delete", Some(&key));
            return Ok(false);
        }
        let mut had_key = raw.entry_contains(&key);
        if had_key {
            check_identity_keys(raw, &key);
        } else {
            key = to_raw(&key);
            had_key = raw.entry_contains(&key);
        }
        let old = if raw.kind().is_keyed() {
            raw.entry_lookup(&key).unwrap_or_default()
        } else {
            Value::Undefined
        };
        let removed = raw.entry_remove(&key);
        if had_key {
            trigger(raw, TriggerOp::Delete, Some(&DepKey::entry(&key)), None, Some(&old), None);
        }
        drop(removed);
        Ok(had_key)
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<()> {
        let raw = self.raw_ref();
        raw.require("clear", ObjectKind::is_iterable)?;
        if self.is_readonly() {
            self.readonly_rejection("Clear", None);
            return Ok(());
        }
        if raw.entry_count() == 0 {
            return Ok(());
        }
        let snapshot = raw.shallow_copy();
        raw.entry_clear();
        trigger(raw, TriggerOp::Clear, None, None, None, Some(&snapshot));
        Ok(())
    }

    /// Call `f(value, key)` for each entry.
    pub fn for_each(&self, mut f: impl FnMut(Value, Value)) -> Result<()> {
        self.raw_ref().require("forEach", ObjectKind::is_iterable)?;
        self.track_iterate(DepKey::Iterate);
        for (key, value) in self.pairs()? {
            f(self.flavor().wrap(value), self.flavor().wrap(key));
        }
        Ok(())
    }

    /// Keys of a map, or members of a set.
    ///
    /// On a map this depends only on which keys exist, not on their values.
    pub fn keys(&self) -> Result<CollectionIter<Value>> {
        let raw = self.raw_ref();
        raw.require("keys", ObjectKind::is_iterable)?;
        self.track_iterate(key_iterate(raw));
        let keys = match self.forwarded() {
            Some(inner) => inner.keys()?.collect(),
            None => raw.entry_pairs().into_iter().map(|(key, _)| key).collect(),
        };
        Ok(CollectionIter::new(keys, self.flavor()))
    }

    pub fn values(&self) -> Result<CollectionIter<Value>> {
        self.raw_ref().require("values", ObjectKind::is_iterable)?;
        self.track_iterate(DepKey::Iterate);
        let values = match self.forwarded() {
            Some(inner) => inner.values()?.collect(),
            None => self.raw_ref().entry_pairs().into_iter().map(|(_, value)| value).collect(),
        };
        Ok(CollectionIter::new(values, self.flavor()))
    }

    /// Default iteration: `[key, value]` arrays for a map, members for a set.
    pub fn iter(&self) -> Result<CollectionIter<Iterated>> {
        let raw = self.raw_ref();
        raw.require("iterate", ObjectKind::is_iterable)?;
        self.track_iterate(DepKey::Iterate);
        let keyed = raw.kind().is_keyed();
        let items = self
            .pairs()?
            .into_iter()
            .map(|(key, value)| if keyed { Iterated::Entry(key, value) } else { Iterated::Member(key) })
            .collect();
        Ok(CollectionIter::new(items, self.flavor()))
    }

    /// `(key, value)` pairs; sets yield each member twice.
    pub fn entries(&self) -> Result<CollectionIter<(Value, Value)>> {
        self.raw_ref().require("entries", ObjectKind::is_iterable)?;
        self.track_iterate(DepKey::Iterate);
        Ok(CollectionIter::new(self.pairs()?, self.flavor()))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
