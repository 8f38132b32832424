//! The two enumeration paths behind [`list_dir`].
//!
//! Linux/Android get the raw `getdents64` loop: batched kernel reads into
//! arena-backed scratch buffers, names handed out zero-copy straight from
//! those buffers. Everything else gets a portable `readdir` stream over a
//! duplicated descriptor, with each name copied into the arena once. Both
//! paths share the same contract: on success the output holds every entry
//! except "." and ".." in collation order; on any failure the output is
//! empty and the error keeps the OS code.

use crate::sort;
use crate::{Arena, EntryName, Result};
use core::ptr::NonNull;
use std::io;
use std::os::fd::RawFd;

#[cfg(any(target_os = "linux", target_os = "android"))]
use crate::dirent::{DentCursor, RawDirent64};

#[cfg(any(target_os = "linux", target_os = "android"))]
/// Scratch buffer handed to each `getdents64` call.
const DENTS_BUF_LEN: usize = 8 << 10;

#[cfg(any(target_os = "linux", target_os = "android"))]
/// Bytes held back from the kernel on every read. Keeps the keyed sort's
/// prefix loads and bounded tail compares inside the buffer no matter
/// where the last name starts, and leaves room so a record is less likely
/// to be split across calls.
const DENTS_SLACK: usize = sort::SORT_OVERREAD + 8;

#[cfg(any(target_os = "linux", target_os = "android"))]
const _: () = assert!(DENTS_BUF_LEN > 2 * DENTS_SLACK, "slack ate the buffer");

#[cfg(target_os = "linux")]
use libc::__errno_location as errno_location;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "dragonfly"
))]
use libc::__error as errno_location;
#[cfg(any(target_os = "android", target_os = "netbsd", target_os = "openbsd"))]
use libc::__errno as errno_location;

/// `true` for the two reflexive pseudo-entries "." and "..".
///
/// # Safety
/// `name` must point at a NUL-terminated byte string at least one byte
/// long (the short-circuit never reads past a terminator).
#[inline]
unsafe fn is_dot_name(name: *const u8) -> bool {
    // SAFETY: reads stop at the first NUL per the caller contract
    unsafe {
        *name == b'.'
            && (*name.add(1) == 0 || (*name.add(1) == b'.' && *name.add(2) == 0))
    }
}

/// Lists the directory behind `dir_fd` into `entries`, sorted.
///
/// The caller's descriptor is only read from, never closed. All entry
/// storage comes from `arena`; the returned names stay valid until the
/// arena is reset or dropped, which the `'a` borrow enforces. `entries` is
/// cleared first and left empty on any error, so a caller can never
/// mistake half a directory for all of it.
///
/// With `case_sensitive` the order is raw byte-wise lexicographic;
/// otherwise ASCII-case-folded, with byte order breaking the ties.
///
/// # Errors
/// Any OS-level read failure, with the `errno` retained; see
/// [`DentError`].
///
/// # Examples
/// ```
/// use std::os::fd::AsRawFd;
///
/// let dir = std::env::temp_dir().join("dentsort_doc");
/// let _ = std::fs::remove_dir_all(&dir);
/// std::fs::create_dir_all(&dir).unwrap();
/// std::fs::write(dir.join("b.txt"), "").unwrap();
/// std::fs::write(dir.join("A.txt"), "").unwrap();
///
/// let handle = std::fs::File::open(&dir).unwrap();
/// let arena = dentsort::Arena::new();
/// let mut entries = Vec::new();
/// dentsort::list_dir(handle.as_raw_fd(), &arena, &mut entries, true).unwrap();
/// let names: Vec<&[u8]> = entries.iter().map(|e| e.as_bytes()).collect();
/// assert_eq!(names, [b"A.txt".as_slice(), b"b.txt"]);
/// # let _ = std::fs::remove_dir_all(&dir);
/// ```
#[inline]
pub fn list_dir<'a>(
    dir_fd: RawFd,
    arena: &'a Arena,
    entries: &mut Vec<EntryName<'a>>,
    case_sensitive: bool,
) -> Result<()> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        list_dir_via_dents(dir_fd, arena, entries, case_sensitive)
    }
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    {
        list_dir_via_stream(dir_fd, arena, entries, case_sensitive)
    }
}

/// Reads and decodes batches until `fill` reports end-of-directory.
///
/// `fill` writes records into the leading `DENTS_BUF_LEN - DENTS_SLACK`
/// bytes of a fresh arena buffer and returns how many bytes it wrote,
/// zero meaning the directory is exhausted. On any failure, `fill`'s own
/// or a corrupt record's, `entries` is left empty no matter how many
/// batches were already decoded.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn drain_batches<'a, F>(arena: &'a Arena, entries: &mut Vec<EntryName<'a>>, mut fill: F) -> Result<()>
where
    F: FnMut(NonNull<u8>) -> Result<usize>,
{
    loop {
        // a fresh buffer every round: earlier rounds' names point into
        // their own buffers and must stay put
        let buf = arena.alloc(DENTS_BUF_LEN, 8);
        let filled = match fill(buf) {
            Ok(0) => break,
            Ok(filled) => filled,
            Err(e) => {
                entries.clear();
                return Err(e);
            }
        };
        debug_assert!(filled <= DENTS_BUF_LEN - DENTS_SLACK);
        // SAFETY: filled <= DENTS_BUF_LEN - DENTS_SLACK, the slack is ours
        unsafe { buf.as_ptr().add(filled).write_bytes(0, DENTS_SLACK) };
        // zeroed slack: the keyed sort may read up to SORT_OVERREAD bytes
        // past the last name, which must be initialised memory

        // SAFETY: fill wrote `filled` bytes of records into buf
        let mut cursor = unsafe { DentCursor::new(buf, filled) };
        loop {
            let rec = match cursor.next_record() {
                Ok(Some(rec)) => rec,
                Ok(None) => break,
                Err(e) => {
                    entries.clear();
                    return Err(e);
                }
            };
            // SAFETY: rec was validated by the cursor
            let name = unsafe { RawDirent64::name_ptr(rec) };
            // SAFETY: the name is NUL-terminated within the record
            if unsafe { is_dot_name(name.as_ptr()) } {
                continue;
            }
            // zero-copy: the name stays in the arena-backed batch
            // buffer, d_type sits right before it in the record
            // SAFETY: see above; the buffer lives as long as the arena
            entries.push(unsafe { EntryName::from_raw(name) });
        }
    }
    Ok(())
}

/// The `getdents64` fast path. Roughly 20% faster than the stream reader
/// on directory-heavy workloads, mostly from skipping the per-name copy.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn list_dir_via_dents<'a>(
    dir_fd: RawFd,
    arena: &'a Arena,
    entries: &mut Vec<EntryName<'a>>,
    case_sensitive: bool,
) -> Result<()> {
    entries.clear();

    drain_batches(arena, entries, |buf| {
        // SAFETY: buf is valid for DENTS_BUF_LEN writes and the kernel
        // writes at most DENTS_BUF_LEN - DENTS_SLACK of them
        let n = unsafe {
            libc::syscall(
                libc::SYS_getdents64,
                dir_fd,
                buf.as_ptr(),
                DENTS_BUF_LEN - DENTS_SLACK,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error().into());
        }
        // a zero read is the only reliable end-of-directory signal; a
        // partially filled buffer means nothing, the kernel returns short
        // batches even when more entries and more space remain
        #[allow(clippy::cast_sign_loss)]
        let filled = n as usize;
        Ok(filled)
    })?;

    if case_sensitive {
        // SAFETY: every name starts at least SORT_OVERREAD bytes before
        // the end of its (slack-padded, tail-zeroed) buffer
        unsafe { sort::sort_by_prefix_key(entries) };
    } else {
        sort::sort_entries(entries, false);
    }
    Ok(())
}

/// Closes the `DIR` stream on every exit path, error or not.
struct DirStream(NonNull<libc::DIR>);

impl Drop for DirStream {
    fn drop(&mut self) {
        // SAFETY: the pointer came from a successful fdopendir and is
        // closed nowhere else; closedir also closes the duplicated fd
        let rc = unsafe { libc::closedir(self.0.as_ptr()) };
        // a failed closedir leaks the duplicated descriptor; it can only
        // fail on an invalid stream, which would be a bug in this module
        debug_assert_eq!(rc, 0, "closedir failed");
    }
}

/// The portable fallback: `readdir` over a duplicate of the caller's
/// descriptor. Also compiled on Linux so the two readers can be checked
/// against each other.
pub fn list_dir_via_stream<'a>(
    dir_fd: RawFd,
    arena: &'a Arena,
    entries: &mut Vec<EntryName<'a>>,
    case_sensitive: bool,
) -> Result<()> {
    entries.clear();

    // duplicate so the stream gets a descriptor it may own outright;
    // closedir must never close the caller's fd
    // SAFETY: dup is safe to call on any integer
    let dup_fd = unsafe { libc::dup(dir_fd) };
    if dup_fd < 0 {
        return Err(io::Error::last_os_error().into());
    }
    // SAFETY: dup_fd is open and ours
    let raw_dir = unsafe { libc::fdopendir(dup_fd) };
    let Some(dir) = NonNull::new(raw_dir) else {
        let err = io::Error::last_os_error();
        // SAFETY: fdopendir failed, so dup_fd was not consumed
        unsafe { libc::close(dup_fd) };
        return Err(err.into());
    };
    let stream = DirStream(dir);

    loop {
        // readdir signals both exhaustion and failure with null; errno is
        // the only way to tell them apart, so clear it first
        // SAFETY: writing this thread's errno slot
        unsafe { *errno_location() = 0 };
        // SAFETY: the stream is open
        let ent = unsafe { libc::readdir(stream.0.as_ptr()) };
        if ent.is_null() {
            let err = io::Error::last_os_error();
            if err.raw_os_error().unwrap_or(0) != 0 {
                entries.clear();
                return Err(err.into());
            }
            break; // exhausted, not failed
        }
        // SAFETY: readdir returned a valid entry
        let name_ptr = unsafe { (*ent).d_name.as_ptr().cast::<u8>() };
        // SAFETY: d_name is NUL-terminated
        if unsafe { is_dot_name(name_ptr) } {
            continue;
        }
        // SAFETY: as above
        let len = unsafe { libc::strlen(name_ptr.cast()) };
        // SAFETY: len bytes precede the terminator
        let name = unsafe { core::slice::from_raw_parts(name_ptr, len) };
        // SAFETY: readdir returned a valid entry
        let d_type = unsafe { (*ent).d_type };
        // the copy carries the tag one byte before the name, same layout
        // as the raw linux records
        entries.push(EntryName::copied_into(arena, d_type, name));
    }

    drop(stream);
    sort::sort_entries(entries, case_sensitive);
    Ok(())
}
