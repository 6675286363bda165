use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;

use crate::diskio::file::FileHandle;
use crate::diskio::io_stats::IoStatsTracker;
use crate::diskio::mmap::MappedRegion;
use crate::sort::run::{Run, RunCursor};
use crate::{RECORD_BYTES, Record};

/// Copy step for the single-run case when no budget is configured.
const DEFAULT_COPY_STEP: usize = 1 << 20;

/// One heap entry: a buffered record tagged with the run it came from.
/// Ordered by value first; ties between runs resolve by run index, which
/// is arbitrary since records carry no identity beyond their value.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapItem {
    value: Record,
    run_index: usize,
}

/// Merge `runs` (all inside `input`) into one sorted run written
/// contiguously starting `out_offset` records into `output`. Resident
/// buffer memory stays within `mem_bytes`: the budget is split into k+1
/// equal shares (k read-ahead buffers plus the output buffer), each rounded
/// down to whole records and floored at one record.
pub fn merge_runs(
    input: &FileHandle,
    output: &FileHandle,
    runs: &[Run],
    out_offset: u64,
    mem_bytes: usize,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<()> {
    if runs.is_empty() {
        return Ok(());
    }
    let k = runs.len();

    if k == 1 {
        return copy_run(input, output, runs[0], out_offset, mem_bytes, tracker);
    }

    let share = ((mem_bytes / (k + 1)) / RECORD_BYTES * RECORD_BYTES).max(RECORD_BYTES);

    let mut cursors: Vec<RunCursor> = runs.iter().map(|&run| RunCursor::new(run, share)).collect();

    let out_capacity = share / RECORD_BYTES;
    let mut out_buf: Vec<Record> = Vec::with_capacity(out_capacity);
    let mut out_cursor = out_offset;

    let mut heap: BinaryHeap<Reverse<HeapItem>> = BinaryHeap::with_capacity(k);
    for (run_index, cursor) in cursors.iter_mut().enumerate() {
        if let Some(value) = cursor.pop(input, tracker)? {
            heap.push(Reverse(HeapItem { value, run_index }));
        }
    }

    while let Some(Reverse(item)) = heap.pop() {
        out_buf.push(item.value);
        if out_buf.len() == out_capacity {
            flush_output(output, &mut out_buf, &mut out_cursor, tracker)?;
        }
        // An exhausted run simply stops being requeued.
        if let Some(value) = cursors[item.run_index].pop(input, tracker)? {
            heap.push(Reverse(HeapItem {
                value,
                run_index: item.run_index,
            }));
        }
    }

    flush_output(output, &mut out_buf, &mut out_cursor, tracker)
}

/// Write the buffered records at the output cursor through a transient
/// mapping, then advance the cursor past them.
fn flush_output(
    output: &FileHandle,
    out_buf: &mut Vec<Record>,
    out_cursor: &mut u64,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<()> {
    if out_buf.is_empty() {
        return Ok(());
    }
    let bytes = out_buf.len() * RECORD_BYTES;
    let start = *out_cursor * RECORD_BYTES as u64;
    let mut region = MappedRegion::map_readwrite(output.as_raw_fd(), start, bytes)?;
    region.records_mut().copy_from_slice(out_buf);
    if let Some(t) = tracker {
        t.track_write(bytes as u64);
    }
    *out_cursor += out_buf.len() as u64;
    out_buf.clear();
    Ok(())
}

/// Degenerate single-run merge: a bounded byte copy between the files, no
/// heap involved.
fn copy_run(
    input: &FileHandle,
    output: &FileHandle,
    run: Run,
    out_offset: u64,
    mem_bytes: usize,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<()> {
    let total = run.byte_length();
    let step = if mem_bytes > 0 {
        mem_bytes
    } else {
        DEFAULT_COPY_STEP
    };
    let out_start = out_offset * RECORD_BYTES as u64;

    let mut done = 0u64;
    while done < total {
        let size = ((total - done) as usize).min(step);
        let src = MappedRegion::map_readonly(input.as_raw_fd(), run.byte_offset() + done, size)?;
        let mut dst = MappedRegion::map_readwrite(output.as_raw_fd(), out_start + done, size)?;
        dst.as_mut_slice().copy_from_slice(src.as_slice());
        if let Some(t) = tracker {
            t.track_read(size as u64);
            t.track_write(size as u64);
        }
        done += size as u64;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_records(path: &std::path::Path, values: &[Record]) {
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn read_records(path: &std::path::Path) -> Vec<Record> {
        std::fs::read(path)
            .unwrap()
            .chunks_exact(RECORD_BYTES)
            .map(|c| Record::from_ne_bytes(c.try_into().unwrap()))
            .collect()
    }

    fn setup(dir: &TempDir, input_values: &[Record]) -> (FileHandle, FileHandle) {
        let in_path = dir.path().join("in.dat");
        let out_path = dir.path().join("out.dat");
        write_records(&in_path, input_values);
        write_records(&out_path, &vec![0; input_values.len()]);
        (
            FileHandle::open_rw(&in_path).unwrap(),
            FileHandle::open_rw(&out_path).unwrap(),
        )
    }

    #[test]
    fn test_three_way_merge() {
        let dir = TempDir::new().unwrap();
        // Three sorted runs of 4 records each.
        let input = [1, 4, 7, 10, 2, 5, 8, 11, 3, 6, 9, 12];
        let (in_file, out_file) = setup(&dir, &input);

        let runs = [Run::new(0, 4), Run::new(4, 4), Run::new(8, 4)];
        merge_runs(&in_file, &out_file, &runs, 0, 1024, None).unwrap();
        drop(out_file);

        assert_eq!(
            read_records(&dir.path().join("out.dat")),
            (1..=12).collect::<Vec<Record>>()
        );
    }

    #[test]
    fn test_merge_with_one_record_buffers() {
        let dir = TempDir::new().unwrap();
        let input = [0, 2, 4, 6, 1, 3, 5, 7];
        let (in_file, out_file) = setup(&dir, &input);

        let runs = [Run::new(0, 4), Run::new(4, 4)];
        // Budget too small for the share formula: every share floors at one
        // record and refills happen constantly.
        merge_runs(&in_file, &out_file, &runs, 0, 1, None).unwrap();
        drop(out_file);

        assert_eq!(
            read_records(&dir.path().join("out.dat")),
            (0..=7).collect::<Vec<Record>>()
        );
    }

    #[test]
    fn test_merge_uneven_runs_with_duplicates() {
        let dir = TempDir::new().unwrap();
        let input = [1, 1, 3, 2, 2, 2, 3, 9];
        let (in_file, out_file) = setup(&dir, &input);

        let runs = [Run::new(0, 3), Run::new(3, 4), Run::new(7, 1)];
        merge_runs(&in_file, &out_file, &runs, 0, 256, None).unwrap();
        drop(out_file);

        assert_eq!(
            read_records(&dir.path().join("out.dat")),
            vec![1, 1, 2, 2, 2, 3, 3, 9]
        );
    }

    #[test]
    fn test_single_run_is_a_plain_copy() {
        let dir = TempDir::new().unwrap();
        let input = [5, 6, 7, 8];
        let (in_file, out_file) = setup(&dir, &input);

        let runs = [Run::new(0, 4)];
        // Step smaller than the run forces several copy iterations.
        merge_runs(&in_file, &out_file, &runs, 0, 2 * RECORD_BYTES, None).unwrap();
        drop(out_file);

        assert_eq!(
            read_records(&dir.path().join("out.dat")),
            vec![5, 6, 7, 8]
        );
    }

    #[test]
    fn test_merge_writes_at_output_offset() {
        let dir = TempDir::new().unwrap();
        let input = [4, 9, 3, 7, 0, 0, 0, 0];
        let (in_file, out_file) = setup(&dir, &input);

        let runs = [Run::new(0, 2), Run::new(2, 2)];
        merge_runs(&in_file, &out_file, &runs, 4, 256, None).unwrap();
        drop(out_file);

        assert_eq!(
            read_records(&dir.path().join("out.dat")),
            vec![0, 0, 0, 0, 3, 4, 7, 9]
        );
    }
}
