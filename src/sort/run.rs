use std::io;

use crate::diskio::file::FileHandle;
use crate::diskio::io_stats::IoStatsTracker;
use crate::diskio::mmap::MappedRegion;
use crate::{RECORD_BYTES, Record};

/// A contiguous, internally sorted sequence of records within one file,
/// in element units. Runs are immutable once written; each merge pass
/// produces brand-new runs in the other file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Run {
    /// Index of the run's first record.
    pub offset: u64,
    /// Number of records in the run.
    pub length: u64,
}

impl Run {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn byte_offset(&self) -> u64 {
        self.offset * RECORD_BYTES as u64
    }

    pub fn byte_length(&self) -> u64 {
        self.length * RECORD_BYTES as u64
    }
}

/// Streaming cursor over one run during a merge: a bounded read-ahead
/// buffer refilled from the file as it drains. Only the buffer's fill
/// level is ever consumed, so a short tail refill cannot replay stale
/// slots.
pub struct RunCursor {
    run: Run,
    /// Records loaded from the file so far; `consumed == run.length` and an
    /// empty buffer together mean the cursor is exhausted.
    consumed: u64,
    buffer: Vec<Record>,
    /// Records per refill.
    capacity: usize,
    /// Next unread slot in `buffer`.
    pos: usize,
    exhausted: bool,
}

impl RunCursor {
    /// `share_bytes` is this run's slice of the merge memory budget; the
    /// buffer never holds more than the run's remaining records.
    pub fn new(run: Run, share_bytes: usize) -> Self {
        let capacity = (share_bytes / RECORD_BYTES).max(1).min(run.length.max(1) as usize);
        Self {
            run,
            consumed: 0,
            buffer: Vec::with_capacity(capacity),
            capacity,
            pos: 0,
            exhausted: run.length == 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Take the next record, refilling the buffer from the file as needed.
    /// `None` once the run is fully consumed.
    pub fn pop(
        &mut self,
        input: &FileHandle,
        tracker: Option<&IoStatsTracker>,
    ) -> io::Result<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.pos >= self.buffer.len() {
            self.refill(input, tracker)?;
            if self.exhausted {
                return Ok(None);
            }
        }
        let value = self.buffer[self.pos];
        self.pos += 1;
        Ok(Some(value))
    }

    /// Load the next stretch of unconsumed records through a transient
    /// mapping; no mapping is held open between calls. Marks the cursor
    /// exhausted when nothing remains.
    fn refill(&mut self, input: &FileHandle, tracker: Option<&IoStatsTracker>) -> io::Result<()> {
        self.pos = 0;
        self.buffer.clear();

        let left = self.run.length - self.consumed;
        if left == 0 {
            self.exhausted = true;
            return Ok(());
        }

        let count = (self.capacity as u64).min(left) as usize;
        let start = (self.run.offset + self.consumed) * RECORD_BYTES as u64;
        let region = MappedRegion::map_readonly(input.as_raw_fd(), start, count * RECORD_BYTES)?;
        self.buffer.extend_from_slice(region.records());
        if let Some(t) = tracker {
            t.track_read((count * RECORD_BYTES) as u64);
        }
        self.consumed += count as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_with_records(dir: &TempDir, name: &str, values: &[Record]) -> FileHandle {
        let path = dir.path().join(name);
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        std::fs::write(&path, bytes).unwrap();
        FileHandle::open_rw(&path).unwrap()
    }

    #[test]
    fn test_cursor_drains_run_with_tiny_buffer() {
        let dir = TempDir::new().unwrap();
        let values: Vec<Record> = (0..10).collect();
        let file = file_with_records(&dir, "run.dat", &values);

        // One-record share forces a refill per pop.
        let mut cursor = RunCursor::new(Run::new(0, 10), RECORD_BYTES);
        let mut drained = Vec::new();
        while let Some(v) = cursor.pop(&file, None).unwrap() {
            drained.push(v);
        }

        assert_eq!(drained, values);
        assert!(cursor.is_exhausted());
        assert!(cursor.pop(&file, None).unwrap().is_none());
    }

    #[test]
    fn test_cursor_short_tail_refill() {
        let dir = TempDir::new().unwrap();
        let values: Vec<Record> = (0..7).collect();
        let file = file_with_records(&dir, "tail.dat", &values);

        // Three-record buffer over a 7-record run: refills of 3, 3, 1.
        let mut cursor = RunCursor::new(Run::new(0, 7), 3 * RECORD_BYTES);
        let mut drained = Vec::new();
        while let Some(v) = cursor.pop(&file, None).unwrap() {
            drained.push(v);
        }

        assert_eq!(drained, values, "partial refill must not replay old slots");
    }

    #[test]
    fn test_cursor_over_run_at_offset() {
        let dir = TempDir::new().unwrap();
        let values: Vec<Record> = vec![9, 9, 9, 1, 2, 3, 9];
        let file = file_with_records(&dir, "mid.dat", &values);

        let mut cursor = RunCursor::new(Run::new(3, 3), 2 * RECORD_BYTES);
        let mut drained = Vec::new();
        while let Some(v) = cursor.pop(&file, None).unwrap() {
            drained.push(v);
        }

        assert_eq!(drained, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_run_is_exhausted_from_the_start() {
        let dir = TempDir::new().unwrap();
        let file = file_with_records(&dir, "empty.dat", &[1, 2]);

        let mut cursor = RunCursor::new(Run::new(0, 0), RECORD_BYTES);
        assert!(cursor.is_exhausted());
        assert!(cursor.pop(&file, None).unwrap().is_none());
    }
}
