//! Arena-backed directory enumeration with deterministic ordering.
//!
//! Given an already-open directory descriptor, [`list_dir`] fills a caller
//! owned vector with pointers to entry names in sorted order. All entry
//! storage comes from a caller supplied bump [`Arena`], so listing a
//! directory costs zero per-entry heap allocations and the whole result is
//! reclaimed in one [`Arena::reset`].
//!
//! On Linux/Android the entries are read with the raw `getdents64` system
//! call and the names are *not* copied: they point straight into the
//! arena-backed syscall buffers. Everywhere else a portable `readdir`
//! stream is used and each name is copied into the arena once.

use libc::{EACCES, EBADF, EINVAL, ELOOP, ENOENT, ENOTDIR};

mod arena;
pub use arena::Arena;
mod entry;
pub use entry::{EntryName, FileType};
mod error;
pub use error::{DentError, Result};
#[cfg(any(target_os = "linux", target_os = "android"))]
mod dirent;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use dirent::{DentCursor, RawDirent64};
mod list;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use list::list_dir_via_dents;
pub use list::{list_dir, list_dir_via_stream};
mod sort;


//this allocator is more efficient than jemalloc through my testing
#[cfg(all(
    feature = "mimalloc",
    any(target_os = "linux", target_os = "macos", target_os = "android")
))]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Errors the callers of [`list_dir`] usually want to swallow rather than
/// abort a tree walk on (directory vanished mid-walk, permissions, etc).
#[must_use]
#[inline]
pub const fn is_benign_listing_error(code: i32) -> bool {
    matches!(code, EINVAL | ENOENT | EACCES | ENOTDIR | ELOOP | EBADF)
    //einval=invalid argument
    //enoent=no such file or directory
    //eacces=permission denied
    //enotdir=not a directory
    //eloop=too many symbolic links
    //ebadf=stale descriptor
}
