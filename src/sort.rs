//! The ordering subsystem: two collation modes over arena-backed names.
//!
//! Case-sensitive ordering on the `getdents64` path uses a word-at-a-time
//! trick: each name's leading 8 bytes are reversibly transformed so that a
//! single native `u64` comparison of that prefix agrees with lexicographic
//! byte order. Most real-world name pairs differ inside the first 8 bytes,
//! so the average comparator cost drops to one integer compare. The
//! transform is undone after sorting, leaving the stored bytes untouched.
//!
//! The portable reader allocates names tightly, where the trick's bounded
//! over-reads would be out of bounds; it uses plain whole-name byte
//! comparison instead, which yields the identical order.

use crate::EntryName;
use core::cmp::Ordering;

/// Bytes compared when two 8-byte prefix keys tie. Generously larger than
/// the 255-byte name limit of every supported filesystem.
pub(crate) const COMPARE_WINDOW: usize = 256;

/// Where the tie-break compare starts. The key already decided the first 8
/// bytes, but starting the window early keeps it covering the whole name;
/// bytes 5..8 are equal whenever the keys tie, so re-comparing them is free
/// of false orderings.
const TAIL_START: usize = 5;

/// How far past a name's first byte the keyed comparator may read.
pub(crate) const SORT_OVERREAD: usize = TAIL_START + COMPARE_WINDOW;

/// The order-preserving key for a name's first 8 bytes: numeric comparison
/// of the result matches lexicographic comparison of the bytes.
#[must_use]
#[inline]
pub(crate) const fn prefix_key(first8: [u8; 8]) -> u64 {
    u64::from_be_bytes(first8)
}

/// In-place, self-inverse version of [`prefix_key`]: after one application
/// a *native* `u64` load of the prefix equals the key. No-op on big-endian.
#[inline]
fn swap_prefix(p: *mut u8) {
    #[cfg(target_endian = "little")]
    // SAFETY: caller of the sort guarantees 8 writable bytes at p
    unsafe {
        let word = p.cast::<u64>().read_unaligned();
        p.cast::<u64>().write_unaligned(word.swap_bytes());
    };
    #[cfg(not(target_endian = "little"))]
    let _ = p;
}

/// Bounded raw compare of the bytes after the prefix key, `memcmp` style.
///
/// # Safety
/// Both pointers must be readable for [`SORT_OVERREAD`] bytes.
#[inline]
unsafe fn tail_cmp(a: *const u8, b: *const u8) -> Ordering {
    for i in TAIL_START..SORT_OVERREAD {
        // SAFETY: i < SORT_OVERREAD, within the caller-guaranteed window
        let (x, y) = unsafe { (*a.add(i), *b.add(i)) };
        if x != y {
            return x.cmp(&y);
        }
    }
    Ordering::Equal
}

/// Case-sensitive sort via the prefix-key trick.
///
/// # Safety
/// Every entry's name pointer must be valid for reads of
/// [`SORT_OVERREAD`] bytes and reads/writes of the first 8 bytes, with all
/// of those bytes initialised. The `getdents64` reader guarantees this by
/// sizing its buffer slack past the last possible name start and zeroing
/// the unfilled tail.
pub(crate) unsafe fn sort_by_prefix_key(entries: &mut [EntryName<'_>]) {
    for e in entries.iter() {
        swap_prefix(e.as_ptr());
    }
    entries.sort_unstable_by(|a, b| {
        // SAFETY: prefixes are transformed, native loads are the key
        let x = unsafe { a.as_ptr().cast::<u64>().read_unaligned() };
        // SAFETY: as above
        let y = unsafe { b.as_ptr().cast::<u64>().read_unaligned() };
        // SAFETY: caller guarantees the over-read window
        x.cmp(&y)
            .then_with(|| unsafe { tail_cmp(a.as_ptr(), b.as_ptr()) })
    });
    for e in entries.iter() {
        swap_prefix(e.as_ptr());
    }
}

/// ASCII-folding comparison with a deterministic tie-break: names equal
/// ignoring case fall back to raw byte order, so "A" sorts before "a" and
/// reruns always agree.
#[must_use]
pub(crate) fn case_insensitive_cmp(a: &[u8], b: &[u8]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase()) {
            Ordering::Equal => {}
            decided => return decided,
        }
    }
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Safe whole-name sort used by the portable reader (both modes) and by
/// the fast reader in case-insensitive mode.
pub(crate) fn sort_entries(entries: &mut [EntryName<'_>], case_sensitive: bool) {
    if case_sensitive {
        entries.sort_unstable_by(|a, b| a.as_bytes().cmp(b.as_bytes()));
    } else {
        entries.sort_by(|a, b| case_insensitive_cmp(a.as_bytes(), b.as_bytes()));
    }
}
