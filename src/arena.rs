use core::cell::{Cell, RefCell};
use core::ptr::NonNull;
use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};

/// Default size of a freshly grown chunk. Big enough that a whole
/// `getdents64` scratch buffer (8 KiB) never sits flush against a chunk
/// boundary between two small allocations.
const DEFAULT_CHUNK_CAPACITY: usize = 64 << 10;

/// Minimum chunk alignment, also the largest alignment callers may request
/// without forcing a dedicated chunk.
const CHUNK_ALIGN: usize = 16;

struct Chunk {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// A bump allocator for directory-entry storage.
///
/// Hands out successive byte ranges from larger chunks and reclaims them
/// all at once via [`reset`](Self::reset). There is no per-allocation
/// deallocation and allocation never returns null: if the global allocator
/// gives up, the process aborts through `handle_alloc_error`. The arena is
/// deliberately bounded this way so the enumeration paths never have to
/// handle a mid-listing out-of-memory condition.
///
/// Allocation takes `&self` (the cursor lives in a `Cell`), so a single
/// arena can back one in-flight listing at a time; the type is `!Sync` and
/// must not be shared across threads.
pub struct Arena {
    chunks: RefCell<Vec<Chunk>>,
    /// Next free byte in the current (last) chunk.
    cursor: Cell<*mut u8>,
    /// One past the end of the current chunk.
    end: Cell<*mut u8>,
    chunk_capacity: usize,
}

impl Arena {
    #[must_use]
    #[inline]
    pub fn new() -> Self {
        Self::with_chunk_capacity(DEFAULT_CHUNK_CAPACITY)
    }

    /// An arena whose chunks hold `chunk_capacity` bytes. Requests larger
    /// than that get a dedicated chunk of their own.
    #[must_use]
    pub fn with_chunk_capacity(chunk_capacity: usize) -> Self {
        Self {
            chunks: RefCell::new(Vec::new()),
            cursor: Cell::new(core::ptr::null_mut()),
            end: Cell::new(core::ptr::null_mut()),
            chunk_capacity: chunk_capacity.max(CHUNK_ALIGN),
        }
    }

    /// Bump-allocates `size` bytes aligned to `align`.
    ///
    /// The returned memory is uninitialised and stays valid until
    /// [`reset`](Self::reset) or drop. `align` must be a power of two no
    /// greater than 16, which covers every user in this crate (the
    /// `getdents64` buffers need 8).
    ///
    /// # Panics
    /// Aborts the process (does not unwind) if the global allocator fails.
    #[inline]
    pub fn alloc(&self, size: usize, align: usize) -> NonNull<u8> {
        debug_assert!(align.is_power_of_two() && align <= CHUNK_ALIGN);
        let size = size.max(1);
        let cur = self.cursor.get();
        let pad = cur.align_offset(align);
        // null cursor means no chunk yet; addr arithmetic still yields 0 remaining
        let remaining = self.end.get().addr() - cur.addr();
        if pad + size <= remaining {
            // SAFETY: pad + size fits between cursor and end of the live chunk
            let p = unsafe { cur.add(pad) };
            // SAFETY: as above
            self.cursor.set(unsafe { p.add(size) });
            // SAFETY: p is inside an allocated chunk, hence non-null
            return unsafe { NonNull::new_unchecked(p) };
        }
        self.grow(size, align)
    }

    #[cold]
    fn grow(&self, size: usize, align: usize) -> NonNull<u8> {
        let cap = self.chunk_capacity.max(size);
        let layout = match Layout::from_size_align(cap, CHUNK_ALIGN.max(align)) {
            Ok(layout) => layout,
            // only reachable on address-space-sized requests
            Err(_) => handle_alloc_error(Layout::new::<u8>()),
        };
        // SAFETY: layout has non-zero size
        let raw = unsafe { alloc(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout)
        };
        self.chunks.borrow_mut().push(Chunk { ptr, layout });
        // SAFETY: size <= cap, both offsets stay within the new chunk
        self.cursor.set(unsafe { ptr.as_ptr().add(size) });
        // SAFETY: as above
        self.end.set(unsafe { ptr.as_ptr().add(cap) });
        ptr
    }

    /// Invalidates every allocation and makes the memory reusable.
    ///
    /// Takes `&mut self` on purpose: any [`EntryName`](crate::EntryName)
    /// still borrowing this arena is a compile error at the call site,
    /// which is the whole use-after-reset story.
    ///
    /// The largest chunk is retained so a reset-per-directory tree walk
    /// stops allocating once it has seen its biggest directory.
    pub fn reset(&mut self) {
        let mut chunks = self.chunks.borrow_mut();
        if chunks.is_empty() {
            return;
        }
        let mut biggest = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.layout.size() > chunks[biggest].layout.size() {
                biggest = i;
            }
        }
        let keep = chunks.swap_remove(biggest);
        for chunk in chunks.drain(..) {
            // SAFETY: chunk was allocated with exactly this layout
            unsafe { dealloc(chunk.ptr.as_ptr(), chunk.layout) };
        }
        self.cursor.set(keep.ptr.as_ptr());
        // SAFETY: offset is the size of the retained chunk's own allocation
        self.end.set(unsafe { keep.ptr.as_ptr().add(keep.layout.size()) });
        chunks.push(keep);
    }

    /// Total bytes currently reserved from the global allocator.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.chunks.borrow().iter().map(|c| c.layout.size()).sum()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for chunk in self.chunks.borrow_mut().drain(..) {
            // SAFETY: chunk was allocated with exactly this layout
            unsafe { dealloc(chunk.ptr.as_ptr(), chunk.layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_alignment() {
        let arena = Arena::new();
        let _ = arena.alloc(3, 1);
        let p = arena.alloc(128, 8);
        assert_eq!(p.as_ptr().addr() % 8, 0);
        let q = arena.alloc(1, 16);
        assert_eq!(q.as_ptr().addr() % 16, 0);
    }

    #[test]
    fn allocations_do_not_overlap() {
        let arena = Arena::with_chunk_capacity(256);
        let a = arena.alloc(64, 8);
        let b = arena.alloc(64, 8);
        // SAFETY: both regions are valid for 64 bytes
        unsafe {
            a.as_ptr().write_bytes(0xAA, 64);
            b.as_ptr().write_bytes(0xBB, 64);
            assert_eq!(*a.as_ptr(), 0xAA);
            assert_eq!(*a.as_ptr().add(63), 0xAA);
            assert_eq!(*b.as_ptr(), 0xBB);
        }
    }

    #[test]
    fn grows_past_chunk_capacity() {
        let arena = Arena::with_chunk_capacity(128);
        let _ = arena.alloc(64, 8);
        // bigger than a whole chunk, must get a dedicated one
        let big = arena.alloc(4096, 8);
        // SAFETY: valid for 4096 writes
        unsafe { big.as_ptr().write_bytes(0x42, 4096) };
        assert!(arena.allocated_bytes() >= 128 + 4096);
    }

    #[test]
    fn reset_reuses_memory() {
        let mut arena = Arena::with_chunk_capacity(1 << 12);
        let first = arena.alloc(100, 8).as_ptr().addr();
        let _ = arena.alloc(100, 8);
        arena.reset();
        let again = arena.alloc(100, 8).as_ptr().addr();
        assert_eq!(first, again);
    }

    #[test]
    fn reset_keeps_only_largest_chunk() {
        let mut arena = Arena::with_chunk_capacity(128);
        let _ = arena.alloc(100, 8);
        let _ = arena.alloc(9000, 8); // dedicated oversized chunk
        arena.reset();
        assert_eq!(arena.allocated_bytes(), 9000);
    }

    #[test]
    fn zero_size_is_fine() {
        let arena = Arena::new();
        let p = arena.alloc(0, 1);
        // SAFETY: zero-size requests still hand back one valid byte
        unsafe { p.as_ptr().write(7) };
    }
}
