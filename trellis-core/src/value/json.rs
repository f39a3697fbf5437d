//! JSON conversion.
//!
//! Serialization reads raw data directly, so it records no dependencies.
//! Wrappers serialize as their raw object and signals as their value.
//! Maps become arrays of `[key, value]` pairs and sets become arrays.

use std::cell::RefCell;

use serde::ser::{Error as _, SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value as Json;

use super::{ObjectKind, PropKey, RawObject, TargetId, Value};
use crate::observe::to_raw;

impl Value {
    /// Build a value from JSON. Objects and arrays become raw objects.
    pub fn from_json(json: &Json) -> Value {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::from(s.as_str()),
            Json::Array(items) => Value::Object(RawObject::from_values(items.iter().map(Value::from_json))),
            Json::Object(props) => Value::Object(RawObject::from_props(
                props.iter().map(|(key, value)| (key.as_str(), Value::from_json(value))),
            )),
        }
    }

    /// Snapshot the value as JSON.
    ///
    /// Fails on cyclic data and on weak collections.
    pub fn to_json(&self) -> serde_json::Result<Json> {
        serde_json::to_value(self)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ancestors = RefCell::new(Vec::new());
        Node {
            value: self,
            ancestors: &ancestors,
        }
        .serialize(serializer)
    }
}

/// A value being serialized, with the objects enclosing it.
struct Node<'a> {
    value: &'a Value,
    ancestors: &'a RefCell<Vec<TargetId>>,
}

impl Node<'_> {
    fn child<'b>(&'b self, value: &'b Value) -> Node<'b> {
        Node {
            value,
            ancestors: self.ancestors,
        }
    }
}

impl Serialize for Node<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = match to_raw(self.value) {
            Value::Undefined | Value::Null => return serializer.serialize_unit(),
            Value::Bool(b) => return serializer.serialize_bool(b),
            Value::Number(n) => return serializer.serialize_f64(n),
            Value::String(s) => return serializer.serialize_str(&s),
            Value::Signal(signal) => {
                let inner = signal.get_untracked();
                return self.child(&inner).serialize(serializer);
            }
            Value::Object(raw) => raw,
            Value::Proxy(proxy) => proxy.raw(),
        };

        if self.ancestors.borrow().contains(&raw.id()) {
            return Err(S::Error::custom(format!("cycle detected at object {}", raw.id())));
        }
        self.ancestors.borrow_mut().push(raw.id());
        let result = serialize_object(self, &raw, serializer);
        self.ancestors.borrow_mut().pop();
        result
    }
}

fn serialize_object<S: Serializer>(node: &Node<'_>, raw: &RawObject, serializer: S) -> Result<S::Ok, S::Error> {
    match raw.kind() {
        ObjectKind::Plain => {
            let keys: Vec<PropKey> = raw
                .own_keys()
                .into_iter()
                .filter(|key| matches!(key, PropKey::Index(_) | PropKey::Name(_)))
                .collect();
            let mut map = serializer.serialize_map(Some(keys.len()))?;
            for key in keys {
                let value = raw.get_prop(&key);
                map.serialize_entry(&key.to_string(), &node.child(&value))?;
            }
            map.end()
        }
        ObjectKind::Array => {
            let len = raw.length().unwrap_or_default();
            let mut seq = serializer.serialize_seq(Some(len))?;
            for i in 0..len {
                let value = raw.get_prop(&PropKey::from(i));
                seq.serialize_element(&node.child(&value))?;
            }
            seq.end()
        }
        ObjectKind::Map => {
            let pairs = raw.entry_pairs();
            let mut seq = serializer.serialize_seq(Some(pairs.len()))?;
            for (key, value) in &pairs {
                seq.serialize_element(&(node.child(key), node.child(value)))?;
            }
            seq.end()
        }
        ObjectKind::Set => {
            let pairs = raw.entry_pairs();
            let mut seq = serializer.serialize_seq(Some(pairs.len()))?;
            for (member, _) in &pairs {
                seq.serialize_element(&node.child(member))?;
            }
            seq.end()
        }
        kind @ (ObjectKind::WeakMap | ObjectKind::WeakSet) => {
            Err(S::Error::custom(format!("cannot serialize a {kind}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::observe::reactive;
    use crate::reactive::Signal;

    #[test]
    fn json_objects_become_raw_objects() {
        let value = Value::from_json(&json!({"a": [1, 2], "b": {"c": null}}));
        assert_eq!(value.get("a").get(1), Value::from(2));
        assert_eq!(value.get("b").get("c"), Value::Null);
        assert_eq!(value.to_json().unwrap(), json!({"a": [1.0, 2.0], "b": {"c": null}}));
    }

    #[test]
    fn wrappers_and_signals_serialize_as_their_data() {
        let raw = RawObject::from_props([("count", Value::from(Signal::new(3)))]);
        let state = reactive(&raw.into());
        assert_eq!(state.to_json().unwrap(), json!({"count": 3.0}));

        let map = RawObject::map_from([("k", 1)]);
        assert_eq!(Value::from(map).to_json().unwrap(), json!([["k", 1.0]]));
    }

    #[test]
    fn cycles_are_rejected() {
        let raw = RawObject::plain();
        raw.set("me", &raw);
        assert!(Value::from(&raw).to_json().is_err());
        raw.set("me", Value::Null);
    }

    #[test]
    fn shared_references_are_not_cycles() {
        let shared = RawObject::from_props([("x", 1)]);
        let raw = RawObject::from_props([("a", Value::from(&shared)), ("b", Value::from(&shared))]);
        assert!(Value::from(raw).to_json().is_ok());
    }
}
