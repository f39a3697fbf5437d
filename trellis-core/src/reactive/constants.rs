//! Tuning constants of the tracking algorithm.

/// Nesting depth up to which dependency diffing uses per-depth marker bits.
///
/// Each running computation owns bit `1 << depth` of every dependency cell's
/// `was_tracked` / `new_tracked` masks. Deeper computations fall back to a
/// full cleanup before each run and a direct membership test on each read.
pub const MAX_MARKER_BITS: u32 = 30;
