//! Error types.
//!
//! Ordinary misuse of an observed object (writing through a readonly view,
//! writing to a frozen object, wrapping a primitive) is never an error: it is
//! absorbed silently or reported through [`crate::diagnostics`]. `Error` is
//! reserved for calls that have no meaning for the target at all, such as
//! `push` on a map.

use crate::value::ObjectKind;

/// Errors returned by the object and wrapper facades.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{operation} is not supported on {kind}")]
    Unsupported {
        operation: &'static str,
        kind: ObjectKind,
    },

    #[error("invalid value used as {kind} key: {found}")]
    InvalidWeakKey { kind: ObjectKind, found: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
