//! Array methods on wrappers.
//!
//! The identity searches track `length` and every index, then look through
//! the raw elements, retrying with the raw form of the needle when the first
//! pass finds nothing. The length-mutating methods run the generic
//! algorithms through the wrapper's own property handlers, so each element
//! write triggers normally, but with tracking paused so the calling
//! computation never depends on the `length` it writes.

use super::{to_raw, Proxy};
use crate::error::Result;
use crate::reactive::{track, untracked, DepKey, TrackOp};
use crate::value::{ObjectKind, PropKey, Value};

fn is_array(kind: ObjectKind) -> bool {
    kind == ObjectKind::Array
}

fn length_of(value: &Value) -> usize {
    match value {
        Value::Number(n) if *n > 0.0 => *n as usize,
        _ => 0,
    }
}

#[derive(Clone, Copy)]
enum Search {
    Includes,
    IndexOf,
    LastIndexOf,
}

impl Search {
    fn matches(self, element: &Value, needle: &Value) -> bool {
        match self {
            Search::Includes => element.same_value_zero(needle),
            Search::IndexOf | Search::LastIndexOf => element.strict_equals(needle),
        }
    }

    fn find(self, elements: &[Value], needle: &Value) -> Option<usize> {
        let mut positions = elements.iter().enumerate();
        match self {
            Search::LastIndexOf => positions.rev().find(|(_, e)| self.matches(e, needle)),
            _ => positions.find(|(_, e)| self.matches(e, needle)),
        }
        .map(|(i, _)| i)
    }
}

impl Proxy {
    /// Whether the array contains `needle`, by SameValueZero.
    pub fn includes(&self, needle: impl Into<Value>) -> Result<bool> {
        self.search("includes", Search::Includes, needle.into())
            .map(|found| found.is_some())
    }

    /// First index of `needle`, by strict equality.
    pub fn index_of(&self, needle: impl Into<Value>) -> Result<Option<usize>> {
        self.search("indexOf", Search::IndexOf, needle.into())
    }

    /// Last index of `needle`, by strict equality.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Result<Option<usize>> {
        self.search("lastIndexOf", Search::LastIndexOf, needle.into())
    }

    fn search(&self, operation: &'static str, search: Search, needle: Value) -> Result<Option<usize>> {
        self.raw_ref().require(operation, is_array)?;
        let this = self.receiver();
        let len = length_of(&this.get_prop(&PropKey::length()));

        if self.is_readonly() {
            // Plain element reads: wrapped, and tracked only by a mutable
            // wrapper underneath.
            let elements: Vec<Value> = (0..len).map(|i| this.get_prop(&PropKey::from(i))).collect();
            return Ok(search.find(&elements, &needle));
        }

        let raw = self.raw_ref();
        for i in 0..len {
            track(raw, TrackOp::Get, DepKey::Prop(PropKey::from(i)));
        }
        let elements: Vec<Value> = (0..len).map(|i| raw.get_prop(&PropKey::from(i))).collect();
        Ok(search
            .find(&elements, &needle)
            .or_else(|| search.find(&elements, &to_raw(&needle))))
    }

    /// Run a length-mutating algorithm, untracked unless readonly.
    fn mutate<R>(&self, operation: &'static str, f: impl FnOnce(&Value) -> R) -> Result<R> {
        self.raw_ref().require(operation, is_array)?;
        let this = self.receiver();
        if self.is_readonly() {
            Ok(f(&this))
        } else {
            Ok(untracked(|| f(&this)))
        }
    }

    /// Append an element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        self.mutate("push", |this| {
            let len = length_of(&this.get_prop(&PropKey::length()));
            this.set_with_receiver(&PropKey::from(len), value, this);
            set_length(this, len + 1);
            len + 1
        })
    }

    /// Remove and return the last element.
    pub fn pop(&self) -> Result<Value> {
        self.mutate("pop", |this| {
            let len = length_of(&this.get_prop(&PropKey::length()));
            if len == 0 {
                set_length(this, 0);
                return Value::Undefined;
            }
            let last = PropKey::from(len - 1);
            let element = this.get_prop(&last);
            this.delete_prop(&last);
            set_length(this, len - 1);
            element
        })
    }

    /// Remove and return the first element.
    pub fn shift(&self) -> Result<Value> {
        self.mutate("shift", |this| {
            let len = length_of(&this.get_prop(&PropKey::length()));
            if len == 0 {
                set_length(this, 0);
                return Value::Undefined;
            }
            let first = this.get_prop(&PropKey::from(0usize));
            for from in 1..len {
                move_element(this, from, from - 1);
            }
            this.delete_prop(&PropKey::from(len - 1));
            set_length(this, len - 1);
            first
        })
    }

    /// Insert an element at the front. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize> {
        let value = value.into();
        self.mutate("unshift", |this| {
            let len = length_of(&this.get_prop(&PropKey::length()));
            for from in (0..len).rev() {
                move_element(this, from, from + 1);
            }
            this.set_with_receiver(&PropKey::from(0usize), value, this);
            set_length(this, len + 1);
            len + 1
        })
    }

    /// Remove `delete_count` elements at `start` (all of the tail if
    /// `None`) and insert `items` in their place. A negative `start` counts
    /// from the end. Returns the removed elements.
    pub fn splice(
        &self,
        start: i64,
        delete_count: Option<usize>,
        items: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<Value>> {
        let items: Vec<Value> = items.into_iter().collect();
        self.mutate("splice", |this| {
            let len = length_of(&this.get_prop(&PropKey::length()));
            let start = if start < 0 {
                len.saturating_sub(start.unsigned_abs() as usize)
            } else {
                (start as usize).min(len)
            };
            let delete_count = delete_count.unwrap_or(len - start).min(len - start);
            let removed: Vec<Value> = (start..start + delete_count)
                .map(|i| this.get_prop(&PropKey::from(i)))
                .collect();

            let item_count = items.len();
            if item_count < delete_count {
                for k in start..len - delete_count {
                    move_element(this, k + delete_count, k + item_count);
                }
                for k in (len - delete_count + item_count..len).rev() {
                    this.delete_prop(&PropKey::from(k));
                }
            } else if item_count > delete_count {
                for k in (start..len - delete_count).rev() {
                    move_element(this, k + delete_count, k + item_count);
                }
            }
            for (offset, item) in items.into_iter().enumerate() {
                this.set_with_receiver(&PropKey::from(start + offset), item, this);
            }
            set_length(this, len - delete_count + item_count);
            removed
        })
    }
}

fn set_length(this: &Value, len: usize) {
    this.set_with_receiver(&PropKey::length(), Value::from(len), this);
}

/// Copy element `from` to `to`, or delete `to` if `from` is absent.
fn move_element(this: &Value, from: usize, to: usize) {
    let from = PropKey::from(from);
    let to = PropKey::from(to);
    if this.has_prop(&from) {
        let element = this.get_prop(&from);
        this.set_with_receiver(&to, element, this);
    } else {
        this.delete_prop(&to);
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
