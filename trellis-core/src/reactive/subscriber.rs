//! Subscriber types for the reactive system.
//!
//! A subscriber is anything a dependency cell can hold and rerun: in this
//! crate, every [`Computation`](super::Computation), whatever its output type.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::effect::EffectCore;

/// Unique identifier for a tracked computation.
///
/// Dependency cells key their membership by this ID, so a computation that
/// reads the same key twice is stored once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate a new unique computation ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ComputationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "computation#{}", self.0)
    }
}

/// A type-erased tracked computation.
///
/// Dependency cells, scopes and the running-computation pointer all hold
/// computations through this trait, so they need not know the output type.
pub(crate) trait Subscriber {
    /// Lifecycle flags and dependency list.
    fn core(&self) -> &EffectCore;

    /// Run the computation, discarding its output.
    fn rerun(self: Rc<Self>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computation_ids_are_unique() {
        let id1 = ComputationId::new();
        let id2 = ComputationId::new();
        let id3 = ComputationId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn computation_ids_increase() {
        let first = ComputationId::new();
        let second = ComputationId::new();
        assert!(second > first);
        assert_eq!(second.to_string(), format!("computation#{}", second.raw()));
    }
}
