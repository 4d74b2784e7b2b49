//! Bitsets for membership tracking over dense `u32` ID spaces.
//!
//! ## Scope
//! Two independent structures that share one word layout:
//!
//! - [`DenseBitSet`]: fixed capacity, words in a [`bumpalo::Bump`] arena or a
//!   borrowed buffer, with whole-set algebra (`and`, `or`, `not`, `and_not`),
//!   first-set-bit scan and population count. Single-writer (`&mut self`).
//! - [`GrowableBitSet`]: lock-free over the full `u32` range. Pages are
//!   allocated on first write and the page directory doubles on demand while
//!   other threads keep reading and writing.
//!
//! ## Word layout
//! Bit `i` is bit `i % 64` of word `i / 64`, least significant bit first.
//! [`DenseBitSet::repr`], [`GrowableBitSet::repr`] and both `load`
//! constructors use it, so a growable bitset can be exported into a dense
//! one and back ([`DenseBitSet::from_growable`], [`GrowableBitSet::from_dense`]).
//!
//! ## Key invariants
//! - Padding bits past `size` in the last word are always zero.
//! - A growable page, once installed, never moves and is freed only on drop.
//! - The growable set count changes only on real 0→1 / 1→0 transitions.
//!
//! ## Features
//! - `stats`: [`GrowableStats`] counters for the growable cold paths.
//! - `bitset-proptest`: property-based test suites.

pub mod error;
pub mod layout;

mod dense;
mod growable;

pub use dense::DenseBitSet;
pub use error::BitSetError;
#[cfg(feature = "stats")]
pub use growable::GrowableStats;
pub use growable::{
    GrowableBitSet, GrowableConfig, DEFAULT_DIRECTORY_SLOTS, MAX_DIRECTORY_SLOTS, PAGE_BITS,
    PAGE_WORDS,
};
pub use layout::{words_for_bits, ID_SPACE_BITS, WORD_BITS};
