use crate::Arena;
use core::marker::PhantomData;
use core::ptr::NonNull;
use libc::{DT_BLK, DT_CHR, DT_DIR, DT_FIFO, DT_LNK, DT_REG, DT_SOCK};

/// A non-owning handle to one directory entry name living in arena memory.
///
/// The pointee is a NUL-terminated byte string; the `d_type` byte the
/// kernel reported for the entry sits immediately before it. On the
/// `getdents64` path that layout falls straight out of `linux_dirent64`
/// (where `d_type` precedes `d_name`); the portable `readdir` path writes
/// the same layout by hand when it copies the name into the arena.
///
/// The lifetime ties the handle to a shared borrow of the [`Arena`] that
/// owns the bytes, so [`Arena::reset`] (which needs `&mut`) statically
/// invalidates every outstanding `EntryName`.
///
/// [`Arena`]: crate::Arena
/// [`Arena::reset`]: crate::Arena::reset
#[derive(Clone, Copy)]
pub struct EntryName<'a> {
    name: NonNull<u8>,
    _arena: PhantomData<&'a [u8]>,
}

impl<'a> EntryName<'a> {
    /// # Safety
    /// - `name` points at a NUL-terminated byte string
    /// - the byte at `name - 1` is the entry's `d_type`
    /// - both live in memory owned by the arena the `'a` borrow came from
    #[inline]
    pub(crate) const unsafe fn from_raw(name: NonNull<u8>) -> Self {
        Self {
            name,
            _arena: PhantomData,
        }
    }

    /// Copies `name` (no terminator) into the arena, laying down the type
    /// tag, the bytes, and a NUL in that order, so the handle sees the
    /// same layout the raw kernel records provide.
    #[must_use]
    pub(crate) fn copied_into(arena: &'a Arena, d_type: u8, name: &[u8]) -> Self {
        let p = arena.alloc(name.len() + 2, 1);
        // SAFETY: allocation is name.len() + 2 bytes
        unsafe {
            p.as_ptr().write(d_type);
            core::ptr::copy_nonoverlapping(name.as_ptr(), p.as_ptr().add(1), name.len());
            p.as_ptr().add(1 + name.len()).write(0);
            Self::from_raw(NonNull::new_unchecked(p.as_ptr().add(1)))
        }
    }

    /// The entry name without its NUL terminator.
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        // SAFETY: construction invariant, the name is NUL-terminated
        let len = unsafe { libc::strlen(self.name.as_ptr().cast()) };
        // SAFETY: len bytes of the name precede the terminator
        unsafe { core::slice::from_raw_parts(self.name.as_ptr(), len) }
    }

    /// The kernel-reported type hint for this entry.
    ///
    /// This is the `d_type` byte, not a `stat` result: filesystems that do
    /// not fill it in yield [`FileType::Unknown`] and callers who care must
    /// stat the entry themselves.
    #[must_use]
    #[inline]
    pub fn file_type(&self) -> FileType {
        // SAFETY: construction invariant, d_type sits one byte before the name
        FileType::from_dtype(unsafe { *self.name.as_ptr().sub(1) })
    }

    #[must_use]
    #[inline]
    pub(crate) const fn as_ptr(&self) -> *mut u8 {
        self.name.as_ptr()
    }
}

impl core::fmt::Debug for EntryName<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}

impl PartialEq for EntryName<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}
impl Eq for EntryName<'_> {}

/// Represents the type of a file in the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileType {
    BlockDevice,
    CharDevice,
    Directory,
    Fifo,
    Symlink,
    RegularFile,
    Socket,
    /// The filesystem declined to report a type (`DT_UNKNOWN`)
    Unknown,
}

impl FileType {
    /// Converts a `d_type` byte to a `FileType`.
    /// Funky filesystems (some NTFS/XFS setups) report `DT_UNKNOWN` for
    /// everything, hence the dedicated variant instead of a guess.
    #[must_use]
    #[inline]
    pub const fn from_dtype(d_type: u8) -> Self {
        match d_type {
            DT_DIR => Self::Directory,
            DT_REG => Self::RegularFile,
            DT_BLK => Self::BlockDevice,
            DT_CHR => Self::CharDevice,
            DT_FIFO => Self::Fifo,
            DT_LNK => Self::Symlink,
            DT_SOCK => Self::Socket,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    #[inline]
    pub const fn is_dir(self) -> bool {
        matches!(self, Self::Directory)
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlockDevice => write!(f, "Block device"),
            Self::CharDevice => write!(f, "Character device"),
            Self::Directory => write!(f, "Directory"),
            Self::Fifo => write!(f, "FIFO"),
            Self::Symlink => write!(f, "Symlink"),
            Self::RegularFile => write!(f, "Regular file"),
            Self::Socket => write!(f, "Socket"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}
