//! Fixed-capacity [`DenseBitSet`] over `[0, size)` with whole-set algebra.
//!
//! # Storage
//! The words live either in a [`bumpalo::Bump`] arena (`init`, `copy`,
//! `load`) or in a caller-owned buffer borrowed for the bitset's lifetime
//! (`borrow`). Either way the bitset never frees its words: arena memory goes
//! away with the arena, borrowed memory stays with the caller. The lifetime
//! `'a` ties the bitset to whichever of the two backs it.
//!
//! # Invariants
//! - `words.len() == words_for_bits(size)`.
//! - Padding bits (positions `>= size` in the last word) are zero. Whole-set
//!   mutators re-apply `tail_mask`; point mutators refuse `id >= size`.
//!
//! # Contract
//! - `set` / `unset` / `boolean` panic when `id >= size`.
//! - `and` / `or` / `and_not` panic when the operands differ in word count.
//! - `enabled` never panics; it reports `false` outside the word range.
//!
//! Mutators take `&mut self`, so sharing a dense bitset across threads
//! requires external synchronization.

use std::fmt;

use bumpalo::Bump;

use crate::error::BitSetError;
use crate::growable::GrowableBitSet;
use crate::layout::{bit_mask, tail_mask, word_index, words_for_bits, ID_SPACE_BITS};

/// Fixed-size bitset backed by arena-allocated or borrowed `u64` words.
///
/// # Examples
///
/// ```
/// use bumpalo::Bump;
/// use idbits::DenseBitSet;
///
/// let arena = Bump::new();
/// let mut bits = DenseBitSet::init(&arena, 100);
/// bits.set(3);
/// bits.set(99);
/// assert_eq!(bits.count(), 2);
/// assert_eq!(bits.first_enabled(), 3);
///
/// bits.not();
/// assert_eq!(bits.count(), 98);
/// ```
#[derive(PartialEq, Eq)]
pub struct DenseBitSet<'a> {
    words: &'a mut [u64],
    tail_mask: u64,
    size: u32,
}

impl<'a> DenseBitSet<'a> {
    /// Allocates a zeroed bitset of `size` bits in `arena`.
    pub fn init(arena: &'a Bump, size: u32) -> Self {
        let words = arena.alloc_slice_fill_copy(words_for_bits(u64::from(size)), 0u64);
        Self::from_parts(words, size)
    }

    /// Deep-copies `src` into `arena`.
    ///
    /// The copy shares nothing with `src`; mutating one never affects the
    /// other.
    pub fn copy(arena: &'a Bump, src: &DenseBitSet<'_>) -> Self {
        let words = arena.alloc_slice_copy(src.repr());
        Self {
            words,
            tail_mask: src.tail_mask,
            size: src.size,
        }
    }

    /// Loads a bitset of `size` bits by copying `repr` into `arena`.
    ///
    /// Only the first `words_for_bits(size)` words are read; padding bits in
    /// the last one are cleared in the copy.
    ///
    /// # Errors
    /// `ReprTooShort` if `repr` holds fewer than `words_for_bits(size)` words.
    pub fn load(arena: &'a Bump, repr: &[u64], size: u32) -> Result<Self, BitSetError> {
        let needed = checked_word_count(repr.len(), size)?;
        let words = arena.alloc_slice_copy(&repr[..needed]);
        let mut bits = Self::from_parts(words, size);
        bits.clear_padding();
        Ok(bits)
    }

    /// Views `repr` as a bitset of `size` bits without copying, clearing the
    /// padding bits of `repr`'s last covered word in place.
    ///
    /// Mutations write straight through to `repr`. Words past
    /// `words_for_bits(size)` are left untouched.
    ///
    /// # Errors
    /// `ReprTooShort` if `repr` holds fewer than `words_for_bits(size)` words.
    pub fn borrow(repr: &'a mut [u64], size: u32) -> Result<Self, BitSetError> {
        let needed = checked_word_count(repr.len(), size)?;
        let mut bits = Self::from_parts(&mut repr[..needed], size);
        bits.clear_padding();
        Ok(bits)
    }

    /// Exports `src` into `arena` at its size as of one
    /// [`snapshot`](GrowableBitSet::snapshot).
    ///
    /// # Errors
    /// `SizeOverflow` if `src` has seen `u32::MAX`, whose extent of `2^32`
    /// bits does not fit a dense size.
    pub fn from_growable(arena: &'a Bump, src: &GrowableBitSet) -> Result<Self, BitSetError> {
        // One extent read for both size and words; writers may still be
        // raising it.
        let (extent, repr) = src.snapshot();
        let size = u32::try_from(extent).map_err(|_| BitSetError::SizeOverflow {
            bits: extent,
            max: ID_SPACE_BITS - 1,
        })?;
        Ok(Self::from_parts(arena.alloc_slice_copy(&repr), size))
    }

    fn from_parts(words: &'a mut [u64], size: u32) -> Self {
        debug_assert_eq!(words.len(), words_for_bits(u64::from(size)));
        Self {
            words,
            tail_mask: tail_mask(u64::from(size)),
            size,
        }
    }

    #[inline]
    fn clear_padding(&mut self) {
        if let Some(last) = self.words.last_mut() {
            *last &= self.tail_mask;
        }
    }

    /// Returns the number of addressable bits.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Returns the backing words for serialization.
    ///
    /// Padding bits beyond `size` are zero.
    #[inline]
    pub fn repr(&self) -> &[u64] {
        &*self.words
    }

    /// Returns whether `id` is set; `false` when `id` falls past the last word.
    #[inline]
    pub fn enabled(&self, id: u32) -> bool {
        self.words
            .get(word_index(id))
            .is_some_and(|word| word & bit_mask(id) != 0)
    }

    /// Sets `id`.
    ///
    /// Panics if `id >= size`.
    #[inline]
    pub fn set(&mut self, id: u32) {
        assert!(id < self.size, "bit index out of bounds");
        if let Some(word) = self.words.get_mut(word_index(id)) {
            *word |= bit_mask(id);
        }
    }

    /// Clears `id`.
    ///
    /// Panics if `id >= size`.
    #[inline]
    pub fn unset(&mut self, id: u32) {
        assert!(id < self.size, "bit index out of bounds");
        if let Some(word) = self.words.get_mut(word_index(id)) {
            *word &= !bit_mask(id);
        }
    }

    /// Sets or clears `id` based on `value`.
    ///
    /// Panics if `id >= size`.
    #[inline]
    pub fn boolean(&mut self, id: u32, value: bool) {
        if value {
            self.set(id);
        } else {
            self.unset(id);
        }
    }

    /// Counts set bits.
    pub fn count(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Counts set bits and zeroes every word in the same pass.
    pub fn count_and_zero(&mut self) -> u32 {
        let mut total = 0;
        for word in self.words.iter_mut() {
            if *word != 0 {
                total += word.count_ones();
                *word = 0;
            }
        }
        total
    }

    /// Returns `true` when no bits are set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Lowest set bit, if any.
    pub fn first_set(&self) -> Option<u32> {
        self.words
            .iter()
            .position(|&word| word != 0)
            .map(|word_idx| word_idx as u32 * 64 + self.words[word_idx].trailing_zeros())
    }

    /// Lowest set bit, or `-1` when the set is empty.
    #[inline]
    pub fn first_enabled(&self) -> i64 {
        self.first_set().map_or(-1, i64::from)
    }

    /// Sets every bit in `[0, size)`.
    pub fn fill_true(&mut self) {
        self.words.fill(u64::MAX);
        self.clear_padding();
    }

    /// Clears every bit.
    pub fn fill_false(&mut self) {
        self.words.fill(0);
    }

    /// Inverts every bit in `[0, size)`.
    pub fn not(&mut self) {
        for word in self.words.iter_mut() {
            *word = !*word;
        }
        // Inverted padding would read as set bits past `size`.
        self.clear_padding();
    }

    /// `self &= src`.
    ///
    /// Panics if the word counts differ.
    pub fn and(&mut self, src: &DenseBitSet<'_>) {
        self.combine(src, |dst, src| dst & src);
    }

    /// `self |= src`.
    ///
    /// Panics if the word counts differ.
    pub fn or(&mut self, src: &DenseBitSet<'_>) {
        self.combine(src, |dst, src| dst | src);
    }

    /// `self &= !src`.
    ///
    /// Panics if the word counts differ.
    pub fn and_not(&mut self, src: &DenseBitSet<'_>) {
        self.combine(src, |dst, src| dst & !src);
    }

    #[inline]
    fn combine(&mut self, src: &DenseBitSet<'_>, op: impl Fn(u64, u64) -> u64) {
        assert_eq!(
            self.words.len(),
            src.words.len(),
            "bitset algebra requires equal word counts"
        );
        for (dst, &src) in self.words.iter_mut().zip(src.words.iter()) {
            *dst = op(*dst, src);
        }
    }

    /// Checks that padding bits beyond `size` are zero.
    #[cfg(any(test, kani))]
    pub(crate) fn padding_invariant_holds(&self) -> bool {
        self.words
            .last()
            .map_or(true, |&last| last & !self.tail_mask == 0)
    }
}

fn checked_word_count(got: usize, size: u32) -> Result<usize, BitSetError> {
    let expected = words_for_bits(u64::from(size));
    if got < expected {
        return Err(BitSetError::ReprTooShort { got, expected });
    }
    Ok(expected)
}

impl fmt::Debug for DenseBitSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseBitSet")
            .field("size", &self.size)
            .field("words_len", &self.words.len())
            .field("count", &self.count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test module includes
// ---------------------------------------------------------------------------

#[cfg(any(all(test, not(loom)), kani))]
#[path = "dense_tests.rs"]
mod dense_tests;
