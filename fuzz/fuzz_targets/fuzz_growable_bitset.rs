#![no_main]

use libfuzzer_sys::fuzz_target;

use idbits::{GrowableBitSet, GrowableConfig, PAGE_BITS};

// Interprets a byte stream as an operation sequence against `GrowableBitSet`,
// checking every result against a `Vec<bool>` ground-truth model.
//
// The model covers 64 pages. The first directory has a single slot so that
// ids in later pages drive directory growth throughout the run.
//
// Byte layout:
// - Groups of `(opcode, page, lo, hi)`; id = page * PAGE_BITS + (hi:lo)
//   - 0 → `set(id)`
//   - 1 → `unset(id)`
//   - 2 → `enabled(id)`
//   - 3 → `count()` / `size()`
//   - 4 → replace with `load` of `snapshot()`
const MODEL_PAGES: u64 = 64;

fuzz_target!(|data: &[u8]| {
    let config = GrowableConfig {
        initial_directory_slots: 1,
    };
    let mut bits = GrowableBitSet::with_config(config).expect("valid config");
    let mut model = vec![false; (MODEL_PAGES * PAGE_BITS) as usize];
    let mut extent = 0u64;

    for op in data.chunks_exact(4) {
        let page = u64::from(op[1]) % MODEL_PAGES;
        let offset = u64::from(u16::from_le_bytes([op[2], op[3]])) % PAGE_BITS;
        let id = (page * PAGE_BITS + offset) as u32;

        match op[0] % 5 {
            0 => {
                bits.set(id);
                model[id as usize] = true;
                extent = extent.max(u64::from(id) + 1);
            }
            1 => {
                bits.unset(id);
                model[id as usize] = false;
                extent = extent.max(u64::from(id) + 1);
            }
            2 => {
                assert_eq!(bits.enabled(id), model[id as usize], "enabled({id}) mismatch");
            }
            3 => {
                let expected = model.iter().filter(|&&x| x).count() as u64;
                assert_eq!(bits.count(), expected, "count() mismatch");
                assert_eq!(bits.size(), extent, "size() mismatch");
            }
            _ => {
                let (size, words) = bits.snapshot();
                let reloaded = GrowableBitSet::load_with_config(&words, size, config)
                    .expect("snapshot words match its size");
                assert_eq!(reloaded.repr(), bits.repr(), "repr/load mismatch");
                bits = reloaded;
            }
        }
    }

    // Final consistency check.
    let expected = model.iter().filter(|&&x| x).count() as u64;
    assert_eq!(bits.count(), expected, "final count mismatch");
    assert_eq!(bits.size(), extent, "final size mismatch");
    for (id, _) in model.iter().enumerate().filter(|&(_, &x)| x) {
        assert!(bits.enabled(id as u32), "final enabled({id}) mismatch");
    }
});
