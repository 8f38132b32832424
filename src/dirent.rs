//! Decoder for the packed `linux_dirent64` records `getdents64` writes.
//!
//! The kernel fills a caller buffer with back-to-back variable-length
//! records; each one declares its own length in `d_reclen` and that length
//! is the only way to find the next record. The original syscall contract
//! trusts `d_reclen` blindly; [`DentCursor`] instead validates every record
//! against the filled region and reports [`DentError::CorruptRecord`]
//! rather than walking off the buffer.
//!
//! [`DentError::CorruptRecord`]: crate::DentError::CorruptRecord

use crate::{DentError, Result};
use core::ptr::NonNull;

/// The `linux_dirent64` layout as written by the kernel. The name is a
/// NUL-terminated byte string occupying the remainder of the record.
#[repr(C)]
pub struct RawDirent64 {
    pub d_ino: u64,
    pub d_off: i64,
    pub d_reclen: u16,
    pub d_type: u8,
    /// Marker for the trailing variable-length name field
    pub d_name: [u8; 0],
}

pub(crate) const NAME_OFFSET: usize = core::mem::offset_of!(RawDirent64, d_name);
pub(crate) const RECLEN_OFFSET: usize = core::mem::offset_of!(RawDirent64, d_reclen);
pub(crate) const TYPE_OFFSET: usize = core::mem::offset_of!(RawDirent64, d_type);

/// Smallest record the kernel can emit: header plus one NUL, padded to 8.
pub(crate) const MIN_RECLEN: usize = (NAME_OFFSET + 1).next_multiple_of(8);

const _: () = assert!(NAME_OFFSET == 19, "unexpected linux_dirent64 layout");
const _: () = assert!(MIN_RECLEN == 24, "unexpected minimum dirent size");

impl RawDirent64 {
    /// Pointer to the record's NUL-terminated name.
    ///
    /// # Safety
    /// `rec` must come from [`DentCursor::next_record`] (i.e. point at a
    /// validated record).
    #[must_use]
    #[inline]
    pub unsafe fn name_ptr(rec: NonNull<Self>) -> NonNull<u8> {
        // SAFETY: validated records are at least NAME_OFFSET + 1 bytes long
        unsafe { NonNull::new_unchecked(rec.as_ptr().cast::<u8>().add(NAME_OFFSET)) }
    }

    /// # Safety
    /// `rec` must point at a validated record.
    #[must_use]
    #[inline]
    pub unsafe fn record_len(rec: NonNull<Self>) -> usize {
        // SAFETY: reclen lies within the validated record; read unaligned so a
        // hostile offset can never fault
        unsafe {
            rec.as_ptr()
                .cast::<u8>()
                .add(RECLEN_OFFSET)
                .cast::<u16>()
                .read_unaligned() as usize
        }
    }

    /// # Safety
    /// `rec` must point at a validated record.
    #[must_use]
    #[inline]
    pub unsafe fn file_type_byte(rec: NonNull<Self>) -> u8 {
        // SAFETY: d_type lies within the validated record
        unsafe { *rec.as_ptr().cast::<u8>().add(TYPE_OFFSET) }
    }

    /// # Safety
    /// `rec` must point at a validated record.
    #[must_use]
    #[inline]
    pub unsafe fn inode(rec: NonNull<Self>) -> u64 {
        // SAFETY: d_ino is the first field of the validated record
        unsafe { rec.as_ptr().cast::<u64>().read_unaligned() }
    }
}

/// Walks the filled portion of a `getdents64` buffer one record at a time.
///
/// Works on raw pointers rather than slices so the names it hands out keep
/// provenance over the whole arena chunk; the fast sort reads a bounded
/// window past each name and must not be confined to the record itself.
pub struct DentCursor {
    base: NonNull<u8>,
    filled: usize,
    pos: usize,
}

impl DentCursor {
    /// # Safety
    /// `base` must be valid for `filled` bytes of reads and contain bytes
    /// written by a `getdents64` call that returned `filled`.
    #[must_use]
    #[inline]
    pub const unsafe fn new(base: NonNull<u8>, filled: usize) -> Self {
        Self {
            base,
            filled,
            pos: 0,
        }
    }

    /// Decodes the record at the cursor and advances past it.
    ///
    /// Returns `Ok(None)` once the filled region is exhausted.
    ///
    /// # Errors
    /// [`DentError::CorruptRecord`] if the record's declared length is
    /// shorter than the fixed header, runs past the filled region, or the
    /// name carries no terminator inside the record.
    pub fn next_record(&mut self) -> Result<Option<NonNull<RawDirent64>>> {
        if self.pos >= self.filled {
            return Ok(None);
        }
        let offset = self.pos;
        let remaining = self.filled - offset;
        if remaining < MIN_RECLEN {
            return Err(DentError::CorruptRecord { offset });
        }
        // SAFETY: offset < filled, so the record header is in bounds
        let rec_ptr = unsafe { self.base.as_ptr().add(offset) };
        // SAFETY: header is in bounds per the check above
        let reclen = unsafe { rec_ptr.add(RECLEN_OFFSET).cast::<u16>().read_unaligned() } as usize;
        if reclen < MIN_RECLEN || reclen > remaining {
            return Err(DentError::CorruptRecord { offset });
        }
        // the name has to terminate inside its own record
        let mut terminated = false;
        for i in NAME_OFFSET..reclen {
            // SAFETY: i < reclen <= remaining bytes from rec_ptr
            if unsafe { *rec_ptr.add(i) } == 0 {
                terminated = true;
                break;
            }
        }
        if !terminated {
            return Err(DentError::CorruptRecord { offset });
        }
        self.pos = offset + reclen;
        // SAFETY: rec_ptr is derived from the non-null base
        Ok(Some(unsafe { NonNull::new_unchecked(rec_ptr.cast()) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One fabricated record, fields in kernel byte order.
    fn record(ino: u64, d_type: u8, name: &[u8]) -> Vec<u8> {
        let reclen = (NAME_OFFSET + name.len() + 1).next_multiple_of(8);
        let mut v = vec![0u8; reclen];
        v[..8].copy_from_slice(&ino.to_ne_bytes());
        v[RECLEN_OFFSET..RECLEN_OFFSET + 2].copy_from_slice(&(reclen as u16).to_ne_bytes());
        v[TYPE_OFFSET] = d_type;
        v[NAME_OFFSET..NAME_OFFSET + name.len()].copy_from_slice(name);
        v
    }

    /// 8-aligned backing storage, like the real syscall buffer.
    fn aligned_copy(bytes: &[u8]) -> Vec<u64> {
        let mut backing = vec![0u64; bytes.len().div_ceil(8)];
        // SAFETY: backing holds at least bytes.len() bytes
        unsafe {
            core::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                backing.as_mut_ptr().cast::<u8>(),
                bytes.len(),
            );
        }
        backing
    }

    fn collect_names(bytes: &[u8]) -> Result<Vec<Vec<u8>>> {
        let backing = aligned_copy(bytes);
        let base = NonNull::new(backing.as_ptr().cast_mut().cast::<u8>()).unwrap();
        // SAFETY: backing is valid for bytes.len() reads
        let mut cursor = unsafe { DentCursor::new(base, bytes.len()) };
        let mut names = Vec::new();
        while let Some(rec) = cursor.next_record()? {
            // SAFETY: rec was just validated by the cursor
            let name = unsafe { RawDirent64::name_ptr(rec) };
            // SAFETY: the cursor checked the terminator exists
            let len = unsafe { libc::strlen(name.as_ptr().cast()) };
            // SAFETY: len bytes precede the terminator
            names.push(unsafe { core::slice::from_raw_parts(name.as_ptr(), len) }.to_vec());
        }
        Ok(names)
    }

    #[test]
    fn walks_every_record() {
        let mut buf = Vec::new();
        buf.extend(record(1, libc::DT_DIR, b"."));
        buf.extend(record(2, libc::DT_DIR, b".."));
        buf.extend(record(3, libc::DT_REG, b"cargo.lock"));
        buf.extend(record(4, libc::DT_LNK, b"a"));
        let names = collect_names(&buf).unwrap();
        assert_eq!(names, [&b"."[..], b"..", b"cargo.lock", b"a"]);
    }

    #[test]
    fn record_fields_survive_decoding() {
        let buf = record(42, libc::DT_REG, b"x.rs");
        let backing = aligned_copy(&buf);
        let base = NonNull::new(backing.as_ptr().cast_mut().cast::<u8>()).unwrap();
        // SAFETY: backing valid for buf.len() reads
        let mut cursor = unsafe { DentCursor::new(base, buf.len()) };
        let rec = cursor.next_record().unwrap().unwrap();
        // SAFETY: rec validated by the cursor
        unsafe {
            assert_eq!(RawDirent64::inode(rec), 42);
            assert_eq!(RawDirent64::file_type_byte(rec), libc::DT_REG);
            assert_eq!(RawDirent64::record_len(rec), buf.len());
        }
    }

    #[test]
    fn empty_region_yields_nothing() {
        assert_eq!(collect_names(&[]).unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn rejects_truncated_tail() {
        let mut buf = record(1, libc::DT_REG, b"ok");
        buf.extend_from_slice(&[0u8; 10]); // half a header
        assert!(matches!(
            collect_names(&buf),
            Err(DentError::CorruptRecord { offset }) if offset == record(1, libc::DT_REG, b"ok").len()
        ));
    }

    #[test]
    fn rejects_undersized_reclen() {
        let mut buf = record(1, libc::DT_REG, b"abcdef");
        buf[RECLEN_OFFSET..RECLEN_OFFSET + 2].copy_from_slice(&8u16.to_ne_bytes());
        assert!(matches!(
            collect_names(&buf),
            Err(DentError::CorruptRecord { offset: 0 })
        ));
    }

    #[test]
    fn rejects_overrunning_reclen() {
        let mut buf = record(1, libc::DT_REG, b"abcdef");
        let bogus = (buf.len() + 8) as u16;
        buf[RECLEN_OFFSET..RECLEN_OFFSET + 2].copy_from_slice(&bogus.to_ne_bytes());
        assert!(matches!(
            collect_names(&buf),
            Err(DentError::CorruptRecord { offset: 0 })
        ));
    }

    #[test]
    fn rejects_unterminated_name() {
        let mut buf = record(1, libc::DT_REG, b"abc");
        for b in &mut buf[NAME_OFFSET..] {
            *b = b'x'; // stomp the terminator and padding
        }
        assert!(matches!(
            collect_names(&buf),
            Err(DentError::CorruptRecord { offset: 0 })
        ));
    }

    #[test]
    fn split_batches_equal_one_batch() {
        // the kernel may return these as one fill or several; the decoded
        // set must not depend on where the split lands
        let recs: Vec<Vec<u8>> = (0..20)
            .map(|i| record(i, libc::DT_REG, format!("file_{i:03}").as_bytes()))
            .collect();
        let whole: Vec<u8> = recs.concat();
        let whole_names = collect_names(&whole).unwrap();

        for split_at in [1, 7, 19] {
            let first: Vec<u8> = recs[..split_at].concat();
            let second: Vec<u8> = recs[split_at..].concat();
            let mut split_names = collect_names(&first).unwrap();
            split_names.extend(collect_names(&second).unwrap());
            assert_eq!(split_names, whole_names);
        }
    }
}
