//! Wrapper handles.

use std::fmt;
use std::rc::{Rc, Weak};

use super::{release, to_reactive, to_readonly};
use crate::value::{ObjectKind, RawObject, TargetId, Value};

/// The variant of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Flavor {
    Reactive,
    ShallowReactive,
    Readonly,
    ShallowReadonly,
}

impl Flavor {
    pub fn is_readonly(self) -> bool {
        matches!(self, Flavor::Readonly | Flavor::ShallowReadonly)
    }

    pub fn is_shallow(self) -> bool {
        matches!(self, Flavor::ShallowReactive | Flavor::ShallowReadonly)
    }

    /// Index of this flavor's identity map.
    pub(super) fn slot(self) -> usize {
        match self {
            Flavor::Reactive => 0,
            Flavor::ShallowReactive => 1,
            Flavor::Readonly => 2,
            Flavor::ShallowReadonly => 3,
        }
    }

    /// Wrap a value handed out by a wrapper of this flavor.
    pub(super) fn wrap(self, value: Value) -> Value {
        match self {
            Flavor::Reactive => to_reactive(&value),
            Flavor::Readonly => to_readonly(&value),
            Flavor::ShallowReactive | Flavor::ShallowReadonly => value,
        }
    }
}

pub(crate) struct ProxyInner {
    id: TargetId,
    flavor: Flavor,
    /// The fully unwrapped object.
    raw: RawObject,
    /// The wrapper this one forwards to, for readonly views of a mutable
    /// wrapper.
    inner: Option<Proxy>,
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let target = match &self.inner {
            Some(inner) => inner.id(),
            None => self.raw.id(),
        };
        release(self.flavor, target);
    }
}

/// A wrapper around a raw object.
///
/// Reads through the wrapper are tracked and writes trigger, according to
/// its [`Flavor`]. Clones share the same wrapper; equality is identity.
#[derive(Clone)]
pub struct Proxy {
    inner: Rc<ProxyInner>,
}

impl Proxy {
    pub(super) fn new(target: &Value, raw: RawObject, flavor: Flavor) -> Self {
        Self {
            inner: Rc::new(ProxyInner {
                id: TargetId::next(),
                flavor,
                raw,
                inner: target.as_proxy().cloned(),
            }),
        }
    }

    pub(super) fn from_inner(inner: Rc<ProxyInner>) -> Self {
        Self { inner }
    }

    /// Identity of the wrapper itself, distinct from its target's.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn flavor(&self) -> Flavor {
        self.inner.flavor
    }

    /// The object behind every wrapper layer.
    pub fn raw(&self) -> RawObject {
        self.inner.raw.clone()
    }

    /// The value this wrapper forwards to: the raw object, or the mutable
    /// wrapper a readonly view was created over.
    pub fn target(&self) -> Value {
        match &self.inner.inner {
            Some(inner) => Value::Proxy(inner.clone()),
            None => Value::Object(self.inner.raw.clone()),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.inner.raw.kind()
    }

    pub fn ptr_eq(&self, other: &Proxy) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakProxy {
        WeakProxy(Rc::downgrade(&self.inner))
    }

    pub(super) fn raw_ref(&self) -> &RawObject {
        &self.inner.raw
    }

    pub(super) fn forwarded(&self) -> Option<&Proxy> {
        self.inner.inner.as_ref()
    }

    pub(super) fn is_readonly(&self) -> bool {
        self.inner.flavor.is_readonly()
    }

    pub(super) fn is_shallow(&self) -> bool {
        self.inner.flavor.is_shallow()
    }

    /// This wrapper as a receiver value.
    pub(super) fn receiver(&self) -> Value {
        Value::Proxy(self.clone())
    }
}

impl PartialEq for Proxy {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Proxy {}

impl fmt::Debug for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("id", &self.inner.id)
            .field("flavor", &self.inner.flavor)
            .field("raw", &self.inner.raw.id())
            .finish()
    }
}

/// Weak handle to a wrapper.
#[derive(Clone)]
pub(crate) struct WeakProxy(pub(super) Weak<ProxyInner>);

impl WeakProxy {
    pub(crate) fn upgrade(&self) -> Option<Proxy> {
        self.0.upgrade().map(Proxy::from_inner)
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
