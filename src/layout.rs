//! Word layout shared by [`DenseBitSet`](crate::DenseBitSet) and
//! [`GrowableBitSet`](crate::GrowableBitSet).
//!
//! Bit `id` lives in word `id / 64` at bit position `id % 64`. A bitset of
//! `n` bits is therefore `ceil(n / 64)` words, and the final word only holds
//! `n % 64` meaningful bits (all 64 when `n` is a multiple of 64). The bits
//! above that are padding and must stay zero on export so two equal sets
//! always serialize to equal word arrays.
//!
//! The array length is not self-describing: callers carry the bit count next
//! to the words.

/// Bits per storage word.
pub const WORD_BITS: u32 = u64::BITS;

/// Number of addressable IDs (`u32::MAX + 1`).
pub const ID_SPACE_BITS: u64 = 1 << 32;

/// Computes the number of `u64` words needed to store `bits` bits.
#[inline]
pub const fn words_for_bits(bits: u64) -> usize {
    bits.div_ceil(WORD_BITS as u64) as usize
}

/// Index of the word holding `id`.
#[inline(always)]
pub const fn word_index(id: u32) -> usize {
    (id / WORD_BITS) as usize
}

/// Single-bit mask selecting `id` within its word.
#[inline(always)]
pub const fn bit_mask(id: u32) -> u64 {
    1u64 << (id % WORD_BITS)
}

/// Mask of the valid bits in the last word of a `bits`-bit set.
///
/// All ones when `bits` is a multiple of 64 (including zero, where there is
/// no last word to mask).
#[inline]
pub const fn tail_mask(bits: u64) -> u64 {
    let remaining_bits = bits % WORD_BITS as u64;
    if remaining_bits == 0 {
        u64::MAX
    } else {
        (1u64 << remaining_bits) - 1
    }
}

#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn verify_word_and_mask_select_id() {
        let id: u32 = kani::any();
        let word = word_index(id);
        let mask = bit_mask(id);

        kani::assert(mask.count_ones() == 1, "mask must select exactly one bit");
        kani::assert(
            word as u64 * 64 + mask.trailing_zeros() as u64 == id as u64,
            "word and mask must reconstruct the id",
        );
    }

    #[kani::proof]
    fn verify_tail_mask_width() {
        let bits: u64 = kani::any();
        kani::assume(bits <= ID_SPACE_BITS);
        let mask = tail_mask(bits);
        let expected = if bits % 64 == 0 { 64 } else { bits % 64 };

        kani::assert(
            mask.count_ones() as u64 == expected,
            "tail mask must cover exactly the valid bits",
        );
        kani::assert(mask.trailing_ones() == mask.count_ones(), "tail mask is contiguous");
    }

    #[kani::proof]
    fn verify_words_for_bits_covers_last_id() {
        let bits: u64 = kani::any();
        kani::assume(bits > 0 && bits <= ID_SPACE_BITS);
        let last = (bits - 1) as u32;

        kani::assert(
            word_index(last) + 1 == words_for_bits(bits),
            "last id must land in the last word",
        );
    }
}
