//! Lock-free [`GrowableBitSet`] over the full `u32` ID space.
//!
//! # Layout
//! A *directory* of page slots indexes fixed-size *pages* of
//! [`PAGE_WORDS`] atomic words. ID `id` lives in page `id / PAGE_BITS`,
//! word `(id % PAGE_BITS) / 64`, bit `id % 64`. Pages are allocated zeroed on
//! the first `set`/`unset` that lands in their range; `enabled` never
//! allocates.
//!
//! # Invariants
//! - A slot goes from empty to holding a page at most once. Installed pages
//!   never move and are freed only by `Drop`.
//! - Directory capacity only grows, by doubling. Each growth publishes a new
//!   *generation* that holds every page of its predecessor.
//! - `set_count` changes by exactly one per real bit transition (0→1 or
//!   1→0), decided from the `fetch_or` / `fetch_and` return value.
//! - `extent` (`max_bit_seen + 1`) never decreases.
//!
//! # Growth protocol
//! Growers race to CAS a successor into `Directory::next`; losers free their
//! unpublished candidate. Every thread that needs the successor first helps
//! copy each slot forward:
//!
//! ```text
//! old slot holds page P  →  CAS new slot: empty → P   (idempotent)
//! old slot empty         →  CAS old slot: empty → MOVED
//! ```
//!
//! `MOVED` seals the old slot so no install can land in a generation after
//! its slot was copied. An installer whose CAS observes `MOVED` follows
//! `next` and retries there. Once a helper has walked every slot, it CASes
//! `current` forward. No generation is used for installs before its
//! predecessor is fully copied, so every page ends up in the newest one.
//!
//! # Reclamation
//! Superseded generations stay linked through `next` and are freed together
//! in `Drop`: a reader may still be walking an old generation, and nothing
//! short of drop proves it is done. Retired memory is bounded by the
//! geometric sum of capacities (less than the current directory's size).
//!
//! # Ordering
//! Slots and `next`/`current` are published with `AcqRel` CAS and read with
//! `Acquire`, so a page's zeroed words are visible before its pointer. Word
//! updates are `AcqRel` and `enabled` loads with `Acquire`: a completed
//! `set(id)` is visible to any `enabled(id)` that starts after it.

#[cfg(loom)]
use loom::sync::atomic::{AtomicI64, AtomicPtr, AtomicU64, Ordering};
#[cfg(not(loom))]
use std::sync::atomic::{AtomicI64, AtomicPtr, AtomicU64, Ordering};

use std::fmt;
use std::ptr::{self, NonNull};

use crossbeam_utils::CachePadded;
use tracing::{debug, trace};

use crate::dense::DenseBitSet;
use crate::error::BitSetError;
use crate::layout::{tail_mask, words_for_bits, ID_SPACE_BITS, WORD_BITS};

/// Words per page (4 KiB of bits).
#[cfg(not(loom))]
pub const PAGE_WORDS: usize = 512;
/// Words per page, shrunk so loom models stay small.
#[cfg(loom)]
pub const PAGE_WORDS: usize = 2;

/// IDs covered by one page.
pub const PAGE_BITS: u64 = PAGE_WORDS as u64 * WORD_BITS as u64;

/// Slot count that covers the whole `u32` ID space.
pub const MAX_DIRECTORY_SLOTS: usize = (ID_SPACE_BITS / PAGE_BITS) as usize;

/// Default first-generation slot count (2 KiB of slots, 8,388,608 IDs).
pub const DEFAULT_DIRECTORY_SLOTS: usize = 256;

const _: () = assert!(PAGE_WORDS.is_power_of_two());
const _: () = assert!(DEFAULT_DIRECTORY_SLOTS <= MAX_DIRECTORY_SLOTS);

/// Construction knobs for [`GrowableBitSet`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GrowableConfig {
    /// Page slots in the first directory generation.
    ///
    /// Must be a power of two no larger than [`MAX_DIRECTORY_SLOTS`]. IDs
    /// below `initial_directory_slots * PAGE_BITS` never trigger growth.
    pub initial_directory_slots: usize,
}

impl Default for GrowableConfig {
    fn default() -> Self {
        Self {
            initial_directory_slots: DEFAULT_DIRECTORY_SLOTS,
        }
    }
}

impl GrowableConfig {
    /// Checks field ranges.
    ///
    /// # Errors
    /// `InvalidConfig` naming the offending field.
    pub fn validate(&self) -> Result<(), BitSetError> {
        let slots = self.initial_directory_slots;
        let detail = if slots == 0 {
            "must be non-zero"
        } else if !slots.is_power_of_two() {
            "must be a power of two"
        } else if slots > MAX_DIRECTORY_SLOTS {
            "must not exceed MAX_DIRECTORY_SLOTS"
        } else {
            return Ok(());
        };
        Err(BitSetError::InvalidConfig {
            field: "initial_directory_slots",
            detail,
        })
    }
}

/// Cold-path counters, enabled with the `stats` feature.
#[cfg(feature = "stats")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GrowableStats {
    /// Successor generations published.
    pub directory_growths: u64,
    /// Pages installed into a slot.
    pub pages_installed: u64,
    /// Page allocations discarded because another thread installed first.
    pub install_races_lost: u64,
}

#[cfg(feature = "stats")]
#[derive(Default)]
struct StatsCounters {
    directory_growths: std::sync::atomic::AtomicU64,
    pages_installed: std::sync::atomic::AtomicU64,
    install_races_lost: std::sync::atomic::AtomicU64,
}

#[cfg(feature = "stats")]
macro_rules! bump_stat {
    ($bits:expr, $field:ident) => {{
        $bits
            .stats
            .$field
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }};
}

#[cfg(not(feature = "stats"))]
macro_rules! bump_stat {
    ($bits:expr, $field:ident) => {{}};
}

/// A page of atomic words; the unit of lazy allocation.
struct Page {
    words: [AtomicU64; PAGE_WORDS],
}

impl Page {
    fn zeroed() -> Box<Self> {
        Box::new(Self {
            words: std::array::from_fn(|_| AtomicU64::new(0)),
        })
    }
}

/// One directory generation.
struct Directory {
    slots: Box<[AtomicPtr<Page>]>,
    /// Successor generation; null until a grower publishes one.
    next: AtomicPtr<Directory>,
}

impl Directory {
    fn with_capacity(capacity: usize) -> Box<Self> {
        Box::new(Self {
            slots: (0..capacity)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            next: AtomicPtr::new(ptr::null_mut()),
        })
    }

    #[inline(always)]
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Seals an empty slot of a superseded generation. Never dereferenced.
#[inline(always)]
fn moved() -> *mut Page {
    NonNull::dangling().as_ptr()
}

/// Splits `id` into (page index, word within page, bit mask).
#[inline(always)]
fn locate(id: u32) -> (usize, usize, u64) {
    let id = u64::from(id);
    let page = (id / PAGE_BITS) as usize;
    let word = ((id % PAGE_BITS) / WORD_BITS as u64) as usize;
    (page, word, 1u64 << (id % WORD_BITS as u64))
}

/// Copies one slot from a superseded generation into its successor.
///
/// Idempotent; any number of helpers may run it for the same slot.
fn forward_slot(from: &AtomicPtr<Page>, to: &AtomicPtr<Page>) {
    let mut page = from.load(Ordering::Acquire);
    loop {
        if page == moved() {
            return;
        }
        if !page.is_null() {
            let forwarded =
                to.compare_exchange(ptr::null_mut(), page, Ordering::AcqRel, Ordering::Acquire);
            debug_assert!(
                forwarded.map_or_else(|seen| seen == page, |_| true),
                "successor slot holds a different page"
            );
            return;
        }
        match from.compare_exchange(page, moved(), Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => return,
            Err(actual) => page = actual,
        }
    }
}

/// Concurrently growable bitset over `u32` IDs.
///
/// All operations take `&self` and are lock-free; share it with `Arc` or
/// scoped threads. Allocation happens only on the first write into a page
/// and on directory growth.
///
/// # Examples
///
/// ```
/// use idbits::GrowableBitSet;
///
/// let bits = GrowableBitSet::new();
/// bits.set(0);
/// bits.set(10_000_000);
/// assert!(bits.enabled(10_000_000));
/// assert_eq!(bits.count(), 2);
/// assert_eq!(bits.size(), 10_000_001);
///
/// let (size, words) = bits.snapshot();
/// let restored = GrowableBitSet::load(&words, size).unwrap();
/// assert!(restored.enabled(0));
/// assert_eq!(restored.count(), 2);
/// ```
pub struct GrowableBitSet {
    /// Newest fully-copied generation known to be published.
    current: AtomicPtr<Directory>,
    /// First generation; owns the `next` chain.
    root: NonNull<Directory>,
    /// `max_bit_seen + 1`; zero until an ID is touched.
    extent: CachePadded<AtomicU64>,
    /// Signed so a decrement racing ahead of its matching increment cannot
    /// wrap. Reads clamp at zero.
    set_count: CachePadded<AtomicI64>,
    #[cfg(feature = "stats")]
    stats: StatsCounters,
}

// SAFETY: The raw pointers reach heap generations and pages owned by this
// struct. Shared state is only touched through atomics; pages and
// generations are never freed before `Drop`, which requires `&mut self`.
unsafe impl Send for GrowableBitSet {}
unsafe impl Sync for GrowableBitSet {}

impl GrowableBitSet {
    /// Creates an empty bitset with [`GrowableConfig::default`].
    pub fn new() -> Self {
        Self::from_valid_config(GrowableConfig::default())
    }

    /// Creates an empty bitset.
    ///
    /// # Errors
    /// `InvalidConfig` if `config` fails [`GrowableConfig::validate`].
    pub fn with_config(config: GrowableConfig) -> Result<Self, BitSetError> {
        config.validate()?;
        Ok(Self::from_valid_config(config))
    }

    fn from_valid_config(config: GrowableConfig) -> Self {
        let root = NonNull::from(Box::leak(Directory::with_capacity(
            config.initial_directory_slots,
        )));
        Self {
            current: AtomicPtr::new(root.as_ptr()),
            root,
            extent: CachePadded::new(AtomicU64::new(0)),
            set_count: CachePadded::new(AtomicI64::new(0)),
            #[cfg(feature = "stats")]
            stats: StatsCounters::default(),
        }
    }

    /// Rebuilds a bitset of `size` bits from the flat word layout.
    ///
    /// Zero words are skipped, so cost tracks the number of nonzero words and
    /// no page is allocated just to hold zeros. `size()` afterwards equals
    /// `size` even when the trailing words are all zero. Bits past `size` in
    /// the final word are ignored.
    ///
    /// # Errors
    /// - `SizeOverflow` if `size > 2^32`.
    /// - `ReprTooShort` if `repr` holds fewer than `ceil(size / 64)` words.
    pub fn load(repr: &[u64], size: u64) -> Result<Self, BitSetError> {
        Self::load_with_config(repr, size, GrowableConfig::default())
    }

    /// [`load`](Self::load) with an explicit configuration.
    ///
    /// # Errors
    /// As [`load`](Self::load), plus `InvalidConfig`.
    pub fn load_with_config(
        repr: &[u64],
        size: u64,
        config: GrowableConfig,
    ) -> Result<Self, BitSetError> {
        config.validate()?;
        if size > ID_SPACE_BITS {
            return Err(BitSetError::SizeOverflow {
                bits: size,
                max: ID_SPACE_BITS,
            });
        }
        let expected = words_for_bits(size);
        if repr.len() < expected {
            return Err(BitSetError::ReprTooShort {
                got: repr.len(),
                expected,
            });
        }
        Ok(Self::load_words(&repr[..expected], size, config))
    }

    /// Imports a dense bitset at its full size.
    pub fn from_dense(src: &DenseBitSet<'_>) -> Self {
        Self::load_words(src.repr(), u64::from(src.size()), GrowableConfig::default())
    }

    /// `words.len()` must equal `words_for_bits(size)`.
    fn load_words(words: &[u64], size: u64, config: GrowableConfig) -> Self {
        debug_assert_eq!(words.len(), words_for_bits(size));
        let bits = Self::from_valid_config(config);
        if size > 0 {
            bits.directory_covering(((size - 1) / PAGE_BITS) as usize);
        }

        let last = words.len().saturating_sub(1);
        let mut population = 0i64;
        let mut cached: Option<(usize, &Page)> = None;
        for (idx, &word) in words.iter().enumerate() {
            let word = if idx == last {
                word & tail_mask(size)
            } else {
                word
            };
            if word == 0 {
                continue;
            }
            let page_idx = idx / PAGE_WORDS;
            let page = match cached {
                Some((cached_idx, page)) if cached_idx == page_idx => page,
                _ => {
                    let page = bits.install_page(bits.current_directory(), page_idx);
                    cached = Some((page_idx, page));
                    page
                }
            };
            page.words[idx % PAGE_WORDS].store(word, Ordering::Relaxed);
            population += i64::from(word.count_ones());
        }

        bits.set_count.store(population, Ordering::Release);
        bits.extent.store(size, Ordering::Release);
        debug!(size, population, "loaded growable bitset");
        bits
    }

    /// Sets `id`, growing the directory and installing its page if needed.
    #[inline]
    pub fn set(&self, id: u32) {
        let (page_idx, word_idx, mask) = locate(id);
        let word = &self.page_for_write(id, page_idx).words[word_idx];
        let prev = word.fetch_or(mask, Ordering::AcqRel);
        if prev & mask == 0 {
            self.set_count.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Clears `id`, growing the directory and installing its page if needed.
    #[inline]
    pub fn unset(&self, id: u32) {
        let (page_idx, word_idx, mask) = locate(id);
        let word = &self.page_for_write(id, page_idx).words[word_idx];
        let prev = word.fetch_and(!mask, Ordering::AcqRel);
        if prev & mask != 0 {
            self.set_count.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Sets or clears `id` based on `value`.
    #[inline]
    pub fn boolean(&self, id: u32, value: bool) {
        if value {
            self.set(id);
        } else {
            self.unset(id);
        }
    }

    /// Returns whether `id` is set. Never allocates.
    #[inline]
    pub fn enabled(&self, id: u32) -> bool {
        let (page_idx, word_idx, mask) = locate(id);
        self.page_at(page_idx)
            .is_some_and(|page| page.words[word_idx].load(Ordering::Acquire) & mask != 0)
    }

    /// Number of set bits.
    ///
    /// Under concurrent writers this is some point-in-time value of the
    /// running counter.
    #[inline]
    pub fn count(&self) -> u64 {
        self.set_count.load(Ordering::Acquire).max(0) as u64
    }

    /// `max_bit_seen + 1`; zero for a fresh bitset.
    ///
    /// This is the logical extent, not a capacity: IDs below it may be
    /// unset, IDs above it have never been touched.
    #[inline]
    pub fn size(&self) -> u64 {
        self.extent.load(Ordering::Acquire)
    }

    /// Page slots in the current directory generation.
    pub fn directory_capacity(&self) -> usize {
        self.current_directory().capacity()
    }

    /// Number of installed pages. O(directory capacity).
    pub fn allocated_pages(&self) -> usize {
        (0..self.directory_capacity())
            .filter(|&page_idx| self.page_at(page_idx).is_some())
            .count()
    }

    /// Snapshot of the cold-path counters.
    #[cfg(feature = "stats")]
    pub fn stats(&self) -> GrowableStats {
        let load = |counter: &std::sync::atomic::AtomicU64| {
            counter.load(std::sync::atomic::Ordering::Relaxed)
        };
        GrowableStats {
            directory_growths: load(&self.stats.directory_growths),
            pages_installed: load(&self.stats.pages_installed),
            install_races_lost: load(&self.stats.install_races_lost),
        }
    }

    /// Exports `[0, size())` in the flat word layout.
    ///
    /// Unallocated pages read as zeros; padding bits past `size()` in the
    /// final word are cleared. Concurrent writers may or may not be
    /// reflected. Under concurrent writers pair the words with the size from
    /// [`snapshot`](Self::snapshot), not a separate `size()` call.
    pub fn repr(&self) -> Vec<u64> {
        self.snapshot().1
    }

    /// Returns `(size, words)` from a single read of the extent.
    ///
    /// `words.len() == words_for_bits(size)` holds even while other threads
    /// keep raising the extent, so the pair always feeds back into
    /// [`load`](Self::load).
    pub fn snapshot(&self) -> (u64, Vec<u64>) {
        let extent = self.size();
        let mut out = vec![0u64; words_for_bits(extent)];
        for (page_idx, chunk) in out.chunks_mut(PAGE_WORDS).enumerate() {
            if let Some(page) = self.page_at(page_idx) {
                for (dst, src) in chunk.iter_mut().zip(page.words.iter()) {
                    *dst = src.load(Ordering::Acquire);
                }
            }
        }
        if let Some(last) = out.last_mut() {
            *last &= tail_mask(extent);
        }
        (extent, out)
    }

    // -----------------------------------------------------------------------
    // Directory and page plumbing
    // -----------------------------------------------------------------------

    #[inline(always)]
    fn current_directory(&self) -> &Directory {
        // SAFETY: `current` always points at a published generation, and
        // generations live until `Drop`.
        unsafe { &*self.current.load(Ordering::Acquire) }
    }

    /// Directory growth, extent update, then page install, in that order.
    #[inline]
    fn page_for_write(&self, id: u32, page_idx: usize) -> &Page {
        let dir = self.directory_covering(page_idx);
        self.extent.fetch_max(u64::from(id) + 1, Ordering::AcqRel);
        self.install_page(dir, page_idx)
    }

    /// Returns a fully-copied generation with a slot for `page_idx`.
    fn directory_covering(&self, page_idx: usize) -> &Directory {
        debug_assert!(page_idx < MAX_DIRECTORY_SLOTS);
        let mut dir = self.current_directory();
        while page_idx >= dir.capacity() {
            let next = self.successor(dir, page_idx);
            dir = self.finish_growth(dir, next);
        }
        dir
    }

    /// Returns `dir`'s successor, publishing one sized for `page_idx` if
    /// none exists yet.
    fn successor(&self, dir: &Directory, page_idx: usize) -> &Directory {
        let existing = dir.next.load(Ordering::Acquire);
        if !existing.is_null() {
            // SAFETY: published generations live until `Drop`.
            return unsafe { &*existing };
        }

        let mut capacity = dir.capacity() * 2;
        while capacity <= page_idx {
            capacity *= 2;
        }
        let candidate = Box::into_raw(Directory::with_capacity(capacity));
        match dir.next.compare_exchange(
            ptr::null_mut(),
            candidate,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                bump_stat!(self, directory_growths);
                debug!(
                    from = dir.capacity(),
                    to = capacity,
                    "growing page directory"
                );
                // SAFETY: just published; lives until `Drop`.
                unsafe { &*candidate }
            }
            Err(winner) => {
                // SAFETY: `candidate` was never published.
                drop(unsafe { Box::from_raw(candidate) });
                // SAFETY: published generations live until `Drop`.
                unsafe { &*winner }
            }
        }
    }

    /// Copies every slot of `old` into `next`, then swings `current`.
    fn finish_growth<'s>(&'s self, old: &'s Directory, next: &'s Directory) -> &'s Directory {
        for (from, to) in old.slots.iter().zip(next.slots.iter()) {
            forward_slot(from, to);
        }
        // Failure means another helper already advanced `current`.
        let _ = self.current.compare_exchange(
            old as *const Directory as *mut Directory,
            next as *const Directory as *mut Directory,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        next
    }

    /// Follows a `MOVED` slot to the successor generation.
    fn advance<'s>(&'s self, dir: &'s Directory) -> &'s Directory {
        let next = dir.next.load(Ordering::Acquire);
        debug_assert!(!next.is_null(), "MOVED slot without a successor");
        // SAFETY: `MOVED` is only written after `next` is published, and the
        // Acquire load of the slot orders this load after that publication.
        let next = unsafe { &*next };
        self.finish_growth(dir, next)
    }

    /// Returns the page for `page_idx`, installing a zeroed one if the slot
    /// is empty. Exactly one install wins per slot; losers free their page.
    fn install_page<'s>(&'s self, dir: &'s Directory, page_idx: usize) -> &'s Page {
        let mut dir = dir;
        let mut spare: Option<Box<Page>> = None;
        loop {
            let slot = &dir.slots[page_idx];
            let page = slot.load(Ordering::Acquire);
            if page == moved() {
                dir = self.advance(dir);
                continue;
            }
            if !page.is_null() {
                // SAFETY: installed pages live until `Drop`.
                return unsafe { &*page };
            }

            let fresh = Box::into_raw(spare.take().unwrap_or_else(Page::zeroed));
            match slot.compare_exchange(
                ptr::null_mut(),
                fresh,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    bump_stat!(self, pages_installed);
                    // SAFETY: just installed; lives until `Drop`.
                    return unsafe { &*fresh };
                }
                Err(seen) => {
                    // SAFETY: `fresh` was never published.
                    spare = Some(unsafe { Box::from_raw(fresh) });
                    if seen == moved() {
                        dir = self.advance(dir);
                        continue;
                    }
                    bump_stat!(self, install_races_lost);
                    trace!(page_idx, "lost page install race");
                    // SAFETY: installed pages live until `Drop`.
                    return unsafe { &*seen };
                }
            }
        }
    }

    /// Read-side page lookup. Never allocates or helps growth.
    fn page_at(&self, page_idx: usize) -> Option<&Page> {
        let mut dir = self.current_directory();
        loop {
            let page = dir.slots.get(page_idx)?.load(Ordering::Acquire);
            if page.is_null() {
                return None;
            }
            if page != moved() {
                // SAFETY: installed pages live until `Drop`.
                return Some(unsafe { &*page });
            }
            // SAFETY: see `advance`.
            dir = unsafe { &*dir.next.load(Ordering::Acquire) };
        }
    }
}

impl Default for GrowableBitSet {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GrowableBitSet {
    fn drop(&mut self) {
        // SAFETY (whole body): `&mut self` excludes every other access, and
        // each generation and page is freed exactly once below.
        unsafe {
            // Finish any copy a panicking grower left behind so the newest
            // generation holds every page.
            let mut newest = self.root.as_ptr();
            loop {
                let dir = &*newest;
                let next = dir.next.load(Ordering::Acquire);
                if next.is_null() {
                    break;
                }
                for (from, to) in dir.slots.iter().zip((*next).slots.iter()) {
                    forward_slot(from, to);
                }
                newest = next;
            }

            for slot in (*newest).slots.iter() {
                let page = slot.load(Ordering::Acquire);
                if !page.is_null() && page != moved() {
                    drop(Box::from_raw(page));
                }
            }

            let mut generation = self.root.as_ptr();
            while !generation.is_null() {
                let dir = Box::from_raw(generation);
                generation = dir.next.load(Ordering::Acquire);
            }
        }
    }
}

impl fmt::Debug for GrowableBitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowableBitSet")
            .field("size", &self.size())
            .field("count", &self.count())
            .field("directory_capacity", &self.directory_capacity())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Test module includes
// ---------------------------------------------------------------------------

#[cfg(all(test, not(loom)))]
#[path = "growable_tests.rs"]
mod growable_tests;

// ---------------------------------------------------------------------------
// Loom concurrency tests
// ---------------------------------------------------------------------------
