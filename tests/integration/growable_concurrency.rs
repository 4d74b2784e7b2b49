//! Multi-threaded stress tests for `GrowableBitSet`.
//!
//! Each test drives real OS threads against one shared bitset, then checks the
//! quiescent state against a serialized model: the final bits, `count()` and
//! `size()` must match what some sequential ordering of the same operations
//! would produce.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use bumpalo::Bump;
use idbits::{words_for_bits, DenseBitSet, GrowableBitSet, PAGE_BITS};

use crate::common::{single_slot_bitset, stress_threads, XorShift64};

const OPS_PER_THREAD: usize = 20_000;

/// Disjoint ids from every thread: the count is the sum of per-thread sets.
#[test]
fn disjoint_sets_count_exactly() {
    let threads = stress_threads();
    let bits = Arc::new(single_slot_bitset());
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let bits = Arc::clone(&bits);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..OPS_PER_THREAD {
                    bits.set((i * threads + t) as u32 * 31);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(bits.count(), (threads * OPS_PER_THREAD) as u64);
    let max_id = ((OPS_PER_THREAD - 1) * threads + threads - 1) as u64 * 31;
    assert_eq!(bits.size(), max_id + 1);
}

/// Random set/unset on per-thread-owned ids spread across many pages, with a
/// per-thread model. Ownership makes each thread's final state independent
/// of interleaving, so the merged models are the serialized reference.
#[test]
fn contended_set_unset_matches_model() {
    let threads = stress_threads();
    let bits = Arc::new(single_slot_bitset());
    let barrier = Arc::new(Barrier::new(threads));
    // Each thread owns ids congruent to its index; ids of different threads
    // share words, pages and directory growth.
    let id_space = 64 * PAGE_BITS as usize;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let bits = Arc::clone(&bits);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let owned = id_space / threads;
                let mut model = vec![false; owned];
                let mut rng = XorShift64::new(0x9e37_79b9 ^ t as u64);
                barrier.wait();
                for _ in 0..OPS_PER_THREAD {
                    let r = rng.next_u64();
                    let slot = (r >> 1) as usize % owned;
                    let id = (slot * threads + t) as u32;
                    let value = r & 1 == 1;
                    bits.boolean(id, value);
                    model[slot] = value;
                }
                model
            })
        })
        .collect();

    let models: Vec<Vec<bool>> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let mut expected = 0u64;
    for (t, model) in models.iter().enumerate() {
        for (slot, &value) in model.iter().enumerate() {
            let id = (slot * threads + t) as u32;
            assert_eq!(bits.enabled(id), value, "id {id}");
            expected += u64::from(value);
        }
    }
    assert_eq!(bits.count(), expected);
}

/// Every thread flips the same small id range. Whatever the interleaving, the
/// counter must agree with the bits that ended up set.
#[test]
fn shared_ids_count_agrees_with_bits() {
    let threads = stress_threads();
    let bits = Arc::new(GrowableBitSet::new());
    let barrier = Arc::new(Barrier::new(threads));
    const SHARED_IDS: u32 = 256;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let bits = Arc::clone(&bits);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut rng = XorShift64::new(0xdead_beef + t as u64);
                barrier.wait();
                for _ in 0..OPS_PER_THREAD {
                    let r = rng.next_u64();
                    bits.boolean((r >> 1) as u32 % SHARED_IDS, r & 1 == 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let enabled = (0..SHARED_IDS).filter(|&id| bits.enabled(id)).count() as u64;
    assert_eq!(bits.count(), enabled);
    assert_eq!(bits.allocated_pages(), 1);
}

/// Writers race each other through many directory generations while a
/// reader keeps checking bits set before the race began.
#[test]
fn growth_under_readers_keeps_earlier_bits() {
    let threads = stress_threads();
    let bits = Arc::new(single_slot_bitset());
    let anchors = [0u32, 7, PAGE_BITS as u32 + 1];
    for id in anchors {
        bits.set(id);
    }

    let stop = Arc::new(AtomicBool::new(false));
    let reader = {
        let bits = Arc::clone(&bits);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Acquire) {
                for id in anchors {
                    assert!(bits.enabled(id), "id {id} lost during growth");
                }
            }
        })
    };

    let barrier = Arc::new(Barrier::new(threads));
    let writers: Vec<_> = (0..threads)
        .map(|t| {
            let bits = Arc::clone(&bits);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Page indices climb geometrically so every writer forces
                // fresh generations.
                let mut written = Vec::new();
                let mut page = 2u64 + t as u64;
                while page * PAGE_BITS < u64::from(u32::MAX) / 4 {
                    let id = (page * PAGE_BITS) as u32 + t as u32;
                    bits.set(id);
                    written.push(id);
                    page = page * 3 / 2 + 1;
                }
                written
            })
        })
        .collect();

    let mut expected: Vec<u32> = anchors.to_vec();
    for writer in writers {
        expected.extend(writer.join().unwrap());
    }
    stop.store(true, Ordering::Release);
    reader.join().unwrap();

    expected.sort_unstable();
    expected.dedup();
    for &id in &expected {
        assert!(bits.enabled(id), "id {id}");
    }
    assert_eq!(bits.count(), expected.len() as u64);
    let max = expected.iter().copied().max().unwrap_or(0);
    assert_eq!(bits.size(), u64::from(max) + 1);
}

/// `repr` taken after all writers join reflects every write.
#[test]
fn repr_after_join_is_complete() {
    let threads = stress_threads();
    let bits = Arc::new(GrowableBitSet::new());
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let bits = Arc::clone(&bits);
            thread::spawn(move || {
                for i in 0..1_000u32 {
                    bits.set(i * 4099 + t as u32);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let (size, words) = bits.snapshot();
    let restored = GrowableBitSet::load(&words, size).unwrap();
    assert_eq!(restored.count(), bits.count());
    assert_eq!(restored.repr(), bits.repr());
}

/// Exports taken while a writer keeps raising the extent always pair a size
/// with exactly `words_for_bits(size)` words.
#[test]
fn exports_during_growth_stay_consistent() {
    const WRITES: u32 = 2_000_000;
    let bits = Arc::new(GrowableBitSet::new());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let bits = Arc::clone(&bits);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for id in 0..WRITES {
                bits.set(id);
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut arena = Bump::new();
    let mut rounds = 0u64;
    loop {
        let finished = done.load(Ordering::Acquire);

        let dense = DenseBitSet::from_growable(&arena, &bits).unwrap();
        let size = dense.size();
        assert_eq!(dense.repr().len(), words_for_bits(u64::from(size)));
        // Ids are written in ascending order and the extent is raised just
        // before the bit lands, so at most the newest id is still unset.
        let count = dense.count();
        assert!(count <= size && count + 1 >= size, "count {count} at size {size}");
        if size >= 2 {
            assert_eq!(dense.first_enabled(), 0);
        }

        let (extent, words) = bits.snapshot();
        assert_eq!(words.len(), words_for_bits(extent));
        let restored = GrowableBitSet::load(&words, extent).unwrap();
        assert_eq!(restored.size(), extent);

        arena.reset();
        rounds += 1;
        if finished {
            break;
        }
    }
    writer.join().unwrap();

    assert!(rounds > 0);
    let dense = DenseBitSet::from_growable(&arena, &bits).unwrap();
    assert_eq!(dense.size(), WRITES);
    assert_eq!(dense.count(), WRITES);
}
