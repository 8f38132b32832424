use libc::{EACCES, EBADF, EINVAL, ELOOP, ENOENT, ENOTDIR};
use std::{fmt, io};

/// Generic result type for directory listing operations
pub type Result<T> = core::result::Result<T, DentError>;

#[derive(Debug)]
/// An error type for directory listing operations.
///
/// The interesting `errno` values get their own variants so callers can
/// match on them without digging the code back out; everything else lands
/// in [`DentError::OsError`]. The original OS error is always retained for
/// diagnostics, see [`raw_os_error`](Self::raw_os_error).
pub enum DentError {
    /// The descriptor does not refer to a directory
    NotADirectory(io::Error),
    /// The directory vanished between open and read
    NotFound(io::Error),
    AccessDenied(io::Error),
    /// Stale or never-opened file descriptor
    BadDescriptor(io::Error),
    TooManySymbolicLinks,
    InvalidArgument(io::Error),
    /// Any other OS-level failure
    OsError(io::Error),
    /// The kernel handed back a `linux_dirent64` record that does not fit
    /// the region it claims to live in (or carries no name terminator)
    CorruptRecord {
        /// Byte offset of the offending record within the syscall buffer
        offset: usize,
    },
}

impl DentError {
    /// The underlying `errno`, if this error came from the OS.
    #[must_use]
    #[inline]
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::NotADirectory(e)
            | Self::NotFound(e)
            | Self::AccessDenied(e)
            | Self::BadDescriptor(e)
            | Self::InvalidArgument(e)
            | Self::OsError(e) => e.raw_os_error(),
            Self::TooManySymbolicLinks => Some(ELOOP),
            Self::CorruptRecord { .. } => None,
        }
    }
}

impl From<io::Error> for DentError {
    fn from(error: io::Error) -> Self {
        // map OS error codes to variants
        match error.raw_os_error() {
            Some(ENOTDIR) => Self::NotADirectory(error),
            Some(ENOENT) => Self::NotFound(error),
            Some(EACCES) => Self::AccessDenied(error),
            Some(EBADF) => Self::BadDescriptor(error),
            Some(ELOOP) => Self::TooManySymbolicLinks,
            Some(EINVAL) => Self::InvalidArgument(error),
            _ => Self::OsError(error),
        }
    }
}

#[allow(clippy::pattern_type_mismatch)]
impl fmt::Display for DentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotADirectory(e) => write!(f, "Not a directory: {e}"),
            Self::NotFound(e) => write!(f, "No such directory: {e}"),
            Self::AccessDenied(e) => write!(f, "Access denied: {e}"),
            Self::BadDescriptor(e) => write!(f, "Bad file descriptor: {e}"),
            Self::TooManySymbolicLinks => write!(f, "Too many symbolic links"),
            Self::InvalidArgument(e) => write!(f, "Invalid argument: {e}"),
            Self::OsError(e) => write!(f, "OS error: {e}"),
            Self::CorruptRecord { offset } => {
                write!(f, "Corrupt directory record at buffer offset {offset}")
            }
        }
    }
}

#[allow(clippy::pattern_type_mismatch)]
impl std::error::Error for DentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotADirectory(e)
            | Self::NotFound(e)
            | Self::AccessDenied(e)
            | Self::BadDescriptor(e)
            | Self::InvalidArgument(e)
            | Self::OsError(e) => Some(e),
            Self::TooManySymbolicLinks | Self::CorruptRecord { .. } => None,
        }
    }
}
