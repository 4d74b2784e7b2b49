//! Round trips through the shared word layout.

use bumpalo::Bump;
use idbits::{words_for_bits, BitSetError, DenseBitSet, GrowableBitSet, GrowableConfig, PAGE_BITS};

#[test]
fn dense_repr_loads_into_growable() {
    let arena = Bump::new();
    let mut dense = DenseBitSet::init(&arena, 1_000);
    for id in (0..1_000).step_by(7) {
        dense.set(id);
    }

    let growable = GrowableBitSet::load(dense.repr(), u64::from(dense.size())).unwrap();
    assert_eq!(growable.count(), u64::from(dense.count()));
    assert_eq!(growable.size(), 1_000);
    assert_eq!(growable.repr(), dense.repr());
}

#[test]
fn growable_repr_loads_into_dense() {
    let growable = GrowableBitSet::new();
    for id in [3u32, 64, 4095, 70_000] {
        growable.set(id);
    }
    let repr = growable.repr();
    assert_eq!(repr.len(), words_for_bits(70_001));

    let arena = Bump::new();
    let dense = DenseBitSet::load(&arena, &repr, growable.size() as u32).unwrap();
    assert_eq!(dense.count(), 4);
    assert_eq!(dense.first_enabled(), 3);
    assert!(dense.enabled(70_000));
}

#[test]
fn borrowed_buffer_feeds_growable() {
    let mut buf = vec![0u64; words_for_bits(PAGE_BITS * 2)];
    {
        let mut view = DenseBitSet::borrow(&mut buf, (PAGE_BITS * 2) as u32).unwrap();
        view.set(1);
        view.set((PAGE_BITS * 2 - 1) as u32);
    }

    let growable = GrowableBitSet::load(&buf, PAGE_BITS * 2).unwrap();
    assert!(growable.enabled(1));
    assert!(growable.enabled((PAGE_BITS * 2 - 1) as u32));
    assert_eq!(growable.count(), 2);
    assert_eq!(growable.allocated_pages(), 2);
}

#[test]
fn conversions_preserve_algebra_results() {
    let arena = Bump::new();
    let mut evens = DenseBitSet::init(&arena, 300);
    let mut threes = DenseBitSet::init(&arena, 300);
    for id in 0..300 {
        if id % 2 == 0 {
            evens.set(id);
        }
        if id % 3 == 0 {
            threes.set(id);
        }
    }
    evens.and(&threes);

    let growable = GrowableBitSet::from_dense(&evens);
    assert_eq!(growable.count(), 50);
    assert!(growable.enabled(294));
    assert!(!growable.enabled(296));

    let back = DenseBitSet::from_growable(&arena, &growable).unwrap();
    assert_eq!(back, evens);
}

#[test]
fn small_first_directory_loads_large_repr() {
    let size = 5 * PAGE_BITS + 17;
    let mut repr = vec![0u64; words_for_bits(size)];
    repr[0] = 1;
    if let Some(last) = repr.last_mut() {
        *last = 1 << 16;
    }
    let config = GrowableConfig {
        initial_directory_slots: 1,
    };
    let growable = GrowableBitSet::load_with_config(&repr, size, config).unwrap();
    assert_eq!(growable.directory_capacity(), 8);
    assert_eq!(growable.count(), 2);
    assert!(growable.enabled((size - 1) as u32));
    assert_eq!(growable.repr(), repr);
}

#[test]
fn errors_are_reported_not_panicked() {
    let arena = Bump::new();
    let err = DenseBitSet::load(&arena, &[], 1).unwrap_err();
    assert_eq!(err.to_string(), "word array too short: 0 words (expected 1)");

    let err = GrowableBitSet::load(&[0; 2], 129).unwrap_err();
    assert!(matches!(err, BitSetError::ReprTooShort { got: 2, expected: 3 }));
}
