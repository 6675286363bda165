use std::io;
use std::os::unix::io::RawFd;
use std::ptr;

use crate::{RECORD_BYTES, Record};

/// The system page size, which mmap offsets must be aligned to.
pub fn page_size() -> usize {
    let ps = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };
    if ps < 1 { 4096 } else { ps as usize }
}

/// A shared memory mapping of an exact byte range of a file.
///
/// Mappings must start on a page boundary, so the requested offset is
/// rounded down to the nearest page and the mapping grows by the leading
/// slack; callers only ever see the `[offset, offset + len)` window.
/// Releasing must use the original aligned address and the full grown
/// size, never the shifted window pointer; `Drop` keeps that pairing on
/// every exit path.
pub struct MappedRegion {
    /// Page-aligned address returned by mmap; null for empty regions.
    base: *mut u8,
    /// Mapped size including the leading slack.
    full_len: usize,
    /// Requested offset minus the aligned offset.
    lead: usize,
    /// Requested size.
    len: usize,
}

impl MappedRegion {
    /// Map `[offset, offset + len)` of `fd` read-only.
    pub fn map_readonly(fd: RawFd, offset: u64, len: usize) -> io::Result<Self> {
        Self::map(fd, offset, len, libc::PROT_READ)
    }

    /// Map `[offset, offset + len)` of `fd` for reading and writing; stores
    /// propagate to the file.
    pub fn map_readwrite(fd: RawFd, offset: u64, len: usize) -> io::Result<Self> {
        Self::map(fd, offset, len, libc::PROT_READ | libc::PROT_WRITE)
    }

    fn map(fd: RawFd, offset: u64, len: usize, prot: libc::c_int) -> io::Result<Self> {
        // Zero-length requests are a no-op, not an error.
        if len == 0 {
            return Ok(Self {
                base: ptr::null_mut(),
                full_len: 0,
                lead: 0,
                len: 0,
            });
        }

        let page = page_size() as u64;
        let aligned_offset = (offset / page) * page;
        let lead = (offset - aligned_offset) as usize;
        let full_len = len + lead;

        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                full_len,
                prot,
                libc::MAP_SHARED,
                fd,
                aligned_offset as libc::off_t,
            )
        };

        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            base: addr as *mut u8,
            full_len,
            lead,
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        if self.len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.base.add(self.lead), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        if self.len == 0 {
            return &mut [];
        }
        unsafe { std::slice::from_raw_parts_mut(self.base.add(self.lead), self.len) }
    }

    /// View the window as records. The window must cover a whole number of
    /// records at a record-aligned file offset; the shifted pointer is then
    /// record-aligned because the page size is a multiple of the record
    /// width.
    pub fn records(&self) -> &[Record] {
        if self.len == 0 {
            return &[];
        }
        let ptr = unsafe { self.base.add(self.lead) };
        debug_assert_eq!(ptr as usize % std::mem::align_of::<Record>(), 0);
        debug_assert_eq!(self.len % RECORD_BYTES, 0);
        unsafe { std::slice::from_raw_parts(ptr as *const Record, self.len / RECORD_BYTES) }
    }

    pub fn records_mut(&mut self) -> &mut [Record] {
        if self.len == 0 {
            return &mut [];
        }
        let ptr = unsafe { self.base.add(self.lead) };
        debug_assert_eq!(ptr as usize % std::mem::align_of::<Record>(), 0);
        debug_assert_eq!(self.len % RECORD_BYTES, 0);
        unsafe { std::slice::from_raw_parts_mut(ptr as *mut Record, self.len / RECORD_BYTES) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if !self.base.is_null() {
            unsafe {
                libc::munmap(self.base as *mut libc::c_void, self.full_len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diskio::file::FileHandle;
    use tempfile::TempDir;

    fn file_with_bytes(dir: &TempDir, name: &str, bytes: &[u8]) -> FileHandle {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        FileHandle::open_rw(&path).unwrap()
    }

    #[test]
    fn test_zero_length_request_is_empty() {
        let dir = TempDir::new().unwrap();
        let file = file_with_bytes(&dir, "a.dat", &[1, 2, 3, 4]);

        let region = MappedRegion::map_readonly(file.as_raw_fd(), 0, 0).unwrap();
        assert!(region.is_empty());
        assert_eq!(region.as_slice(), &[] as &[u8]);
    }

    #[test]
    fn test_unaligned_offset_sees_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..64u8).collect();
        let file = file_with_bytes(&dir, "b.dat", &bytes);

        // Offset 24 is record-aligned but not page-aligned.
        let region = MappedRegion::map_readonly(file.as_raw_fd(), 24, 16).unwrap();
        assert_eq!(region.len(), 16);
        assert_eq!(region.as_slice(), &bytes[24..40]);
    }

    #[test]
    fn test_release_does_not_disturb_other_regions() {
        let dir = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..128u8).collect();
        let file = file_with_bytes(&dir, "c.dat", &bytes);

        let keep = MappedRegion::map_readonly(file.as_raw_fd(), 8, 32).unwrap();
        {
            let other = MappedRegion::map_readonly(file.as_raw_fd(), 40, 32).unwrap();
            assert_eq!(other.as_slice(), &bytes[40..72]);
        }
        assert_eq!(keep.as_slice(), &bytes[8..40]);
    }

    #[test]
    fn test_writes_reach_the_file() {
        let dir = TempDir::new().unwrap();
        let file = file_with_bytes(&dir, "d.dat", &[0u8; 32]);

        {
            let mut region = MappedRegion::map_readwrite(file.as_raw_fd(), 8, 8).unwrap();
            region.records_mut()[0] = -42;
        }

        let mut buf = [0u8; 8];
        file.read_exact_at(&mut buf, 8).unwrap();
        assert_eq!(Record::from_ne_bytes(buf), -42);
    }

    #[test]
    fn test_record_view_round_trips_values() {
        let dir = TempDir::new().unwrap();
        let values: Vec<Record> = vec![i64::MIN, -1, 0, 7, i64::MAX];
        let mut bytes = Vec::new();
        for v in &values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let file = file_with_bytes(&dir, "e.dat", &bytes);

        let region =
            MappedRegion::map_readonly(file.as_raw_fd(), 0, values.len() * RECORD_BYTES).unwrap();
        assert_eq!(region.records(), values.as_slice());
    }
}
