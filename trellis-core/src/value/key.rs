//! Property Keys
//!
//! Keys used to address properties of plain objects and arrays, and the
//! hashable identity form of values used as collection entry keys.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::TargetId;

/// A symbol key.
///
/// The well-known symbols describe built-in language protocols. Reads of
/// them are never tracked, because no computation can meaningfully depend
/// on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Iterator,
    AsyncIterator,
    HasInstance,
    ToPrimitive,
    ToStringTag,
    Unscopables,
    /// A user-created symbol, unique per call to [`Symbol::new`].
    Custom(u64),
}

impl Symbol {
    /// Create a fresh, unique symbol.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Symbol::Custom(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this is one of the built-in protocol symbols.
    pub fn is_well_known(&self) -> bool {
        !matches!(self, Symbol::Custom(_))
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal introspection keys answered directly by wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Set on raw objects excluded from wrapping by `mark_raw`.
    Skip,
    IsReactive,
    IsReadonly,
    IsShallow,
    /// Yields the wrapper's target.
    Raw,
}

/// Names whose reads never register a dependency.
const NON_TRACKABLE_NAMES: [&str; 3] = ["__proto__", "__v_isRef", "__isVue"];

/// A property key of a plain object or array.
///
/// Canonical array-index strings (`"0"`, `"17"`) normalize to
/// [`PropKey::Index`], so `"3"` and `3` address the same property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropKey {
    Index(u32),
    Name(Rc<str>),
    Symbol(Symbol),
    Marker(Marker),
}

impl PropKey {
    /// The `length` key of arrays.
    pub fn length() -> Self {
        PropKey::Name(Rc::from("length"))
    }

    pub fn is_length(&self) -> bool {
        matches!(self, PropKey::Name(name) if &**name == "length")
    }

    /// The integer index, if this is an index key.
    pub fn index(&self) -> Option<u32> {
        match self {
            PropKey::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn is_index(&self) -> bool {
        matches!(self, PropKey::Index(_))
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, PropKey::Marker(_))
    }

    /// Whether reads of this key may register a dependency.
    pub fn is_trackable(&self) -> bool {
        match self {
            PropKey::Symbol(symbol) => !symbol.is_well_known(),
            PropKey::Marker(_) => false,
            PropKey::Name(name) => !NON_TRACKABLE_NAMES.contains(&&**name),
            PropKey::Index(_) => true,
        }
    }
}

impl From<&str> for PropKey {
    fn from(name: &str) -> Self {
        // Array indices stop at 2^32 - 2; u32::MAX is an ordinary name.
        match name.parse::<u32>() {
            Ok(index) if index != u32::MAX && index.to_string() == name => PropKey::Index(index),
            _ => PropKey::Name(Rc::from(name)),
        }
    }
}

impl From<String> for PropKey {
    fn from(name: String) -> Self {
        PropKey::from(name.as_str())
    }
}

impl From<u32> for PropKey {
    fn from(index: u32) -> Self {
        if index == u32::MAX {
            PropKey::Name(Rc::from(index.to_string()))
        } else {
            PropKey::Index(index)
        }
    }
}

impl From<usize> for PropKey {
    fn from(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(index) => PropKey::from(index),
            Err(_) => PropKey::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<i32> for PropKey {
    fn from(index: i32) -> Self {
        match u32::try_from(index) {
            Ok(index) => PropKey::from(index),
            Err(_) => PropKey::Name(Rc::from(index.to_string())),
        }
    }
}

impl From<Symbol> for PropKey {
    fn from(symbol: Symbol) -> Self {
        PropKey::Symbol(symbol)
    }
}

impl From<Marker> for PropKey {
    fn from(marker: Marker) -> Self {
        PropKey::Marker(marker)
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Index(i) => write!(f, "{i}"),
            PropKey::Name(name) => f.write_str(name),
            PropKey::Symbol(Symbol::Custom(id)) => write!(f, "Symbol({id})"),
            PropKey::Symbol(symbol) => write!(f, "Symbol.{symbol:?}"),
            PropKey::Marker(marker) => write!(f, "[[{marker:?}]]"),
        }
    }
}

/// Hashable identity of a value used as a collection key.
///
/// Follows SameValueZero: every NaN is the same key, `+0` and `-0` are the
/// same key, and reference values compare by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryKey {
    Undefined,
    Null,
    Bool(bool),
    Number(u64),
    String(Rc<str>),
    Ref(TargetId),
}

impl EntryKey {
    pub(crate) fn number(n: f64) -> Self {
        if n.is_nan() {
            EntryKey::Number(f64::NAN.to_bits())
        } else if n == 0.0 {
            EntryKey::Number(0f64.to_bits())
        } else {
            EntryKey::Number(n.to_bits())
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKey::Undefined => f.write_str("undefined"),
            EntryKey::Null => f.write_str("null"),
            EntryKey::Bool(b) => write!(f, "{b}"),
            EntryKey::Number(bits) => write!(f, "{}", f64::from_bits(*bits)),
            EntryKey::String(s) => write!(f, "{s:?}"),
            EntryKey::Ref(id) => write!(f, "{id}"),
        }
    }
}
