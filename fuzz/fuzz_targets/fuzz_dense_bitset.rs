#![no_main]

use bumpalo::Bump;
use libfuzzer_sys::fuzz_target;

use idbits::DenseBitSet;

// Interprets a byte stream as an operation sequence against two same-size
// `DenseBitSet`s, checking every result against `Vec<bool>` models.
//
// Byte layout:
// - Bytes 0..2 → `size` (little-endian u16; 0 is allowed)
// - Remaining bytes as `(opcode, operand)` pairs, operand scaled by 257:
//   - 0 → `a.set(id)`          - 4 → `a.and(&b)`
//   - 1 → `a.unset(id)`        - 5 → `a.or(&b)`
//   - 2 → `b.set(id)`          - 6 → `a.and_not(&b)`
//   - 3 → `a.enabled(id)`      - 7 → `a.not()`
//   - 8 → `a.count()` / `first_enabled()`
//   - 9 → `a.count_and_zero()`
//   - 10 → reload `a` from `a.repr()`
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let size = u32::from(u16::from_le_bytes([data[0], data[1]]));
    let arena = Bump::new();
    let mut a = DenseBitSet::init(&arena, size);
    let mut b = DenseBitSet::init(&arena, size);
    let mut model_a = vec![false; size as usize];
    let mut model_b = vec![false; size as usize];

    let ops = &data[2..];
    let mut i = 0;
    while i + 1 < ops.len() {
        let opcode = ops[i];
        let raw = u32::from(ops[i + 1]) * 257;
        i += 2;
        let id = if size == 0 { None } else { Some(raw % size) };

        match opcode % 11 {
            0 => {
                if let Some(id) = id {
                    a.set(id);
                    model_a[id as usize] = true;
                }
            }
            1 => {
                if let Some(id) = id {
                    a.unset(id);
                    model_a[id as usize] = false;
                }
            }
            2 => {
                if let Some(id) = id {
                    b.set(id);
                    model_b[id as usize] = true;
                }
            }
            3 => {
                if let Some(id) = id {
                    assert_eq!(a.enabled(id), model_a[id as usize], "enabled({id}) mismatch");
                }
                assert!(!a.enabled(size), "enabled(size) must be false");
            }
            4 => {
                a.and(&b);
                for (x, &y) in model_a.iter_mut().zip(&model_b) {
                    *x &= y;
                }
            }
            5 => {
                a.or(&b);
                for (x, &y) in model_a.iter_mut().zip(&model_b) {
                    *x |= y;
                }
            }
            6 => {
                a.and_not(&b);
                for (x, &y) in model_a.iter_mut().zip(&model_b) {
                    *x &= !y;
                }
            }
            7 => {
                a.not();
                for x in model_a.iter_mut() {
                    *x = !*x;
                }
            }
            8 => {
                let expected = model_a.iter().filter(|&&x| x).count() as u32;
                assert_eq!(a.count(), expected, "count() mismatch");
                let first = model_a.iter().position(|&x| x).map_or(-1, |idx| idx as i64);
                assert_eq!(a.first_enabled(), first, "first_enabled() mismatch");
            }
            9 => {
                let expected = model_a.iter().filter(|&&x| x).count() as u32;
                assert_eq!(a.count_and_zero(), expected, "count_and_zero() mismatch");
                model_a.fill(false);
            }
            _ => {
                let reloaded =
                    DenseBitSet::load(&arena, a.repr(), size).expect("repr matches its own size");
                assert_eq!(reloaded, a, "repr/load mismatch");
                a = reloaded;
            }
        }
    }

    // Final consistency check, padding included.
    let expected = model_a.iter().filter(|&&x| x).count() as u32;
    assert_eq!(a.count(), expected, "final count mismatch");
    for (id, &x) in model_a.iter().enumerate() {
        assert_eq!(a.enabled(id as u32), x, "final enabled({id}) mismatch");
    }
});
