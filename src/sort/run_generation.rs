use std::io;

use crate::RECORD_BYTES;
use crate::diskio::file::FileHandle;
use crate::diskio::io_stats::IoStatsTracker;
use crate::diskio::mmap::MappedRegion;
use crate::sort::run::Run;

/// Sort `run`'s byte range of `input` in place through a shared mapping,
/// then copy the sorted bytes into the same range of `output` when given.
pub fn sort_chunk(
    input: &FileHandle,
    output: Option<&FileHandle>,
    run: Run,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<()> {
    let bytes = run.byte_length() as usize;
    if bytes == 0 {
        return Ok(());
    }

    let mut region = MappedRegion::map_readwrite(input.as_raw_fd(), run.byte_offset(), bytes)?;
    region.records_mut().sort_unstable();
    if let Some(t) = tracker {
        t.track_read(bytes as u64);
    }

    if let Some(out) = output {
        let mut out_region = MappedRegion::map_readwrite(out.as_raw_fd(), run.byte_offset(), bytes)?;
        out_region.as_mut_slice().copy_from_slice(region.as_slice());
        if let Some(t) = tracker {
            t.track_write(bytes as u64);
        }
    }

    Ok(())
}

/// Partition `[0, total_records)` into consecutive chunks of at most
/// `chunk_bytes` worth of records (at least one record each), sort every
/// chunk, and record it as a run in `output`. Chunk boundaries are kept:
/// a run occupies the same element range in both files.
pub fn create_initial_runs(
    input: &FileHandle,
    output: &FileHandle,
    total_records: u64,
    chunk_bytes: usize,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<Vec<Run>> {
    let chunk_records = ((chunk_bytes / RECORD_BYTES) as u64).max(1);

    let mut runs = Vec::with_capacity(total_records.div_ceil(chunk_records) as usize);
    let mut offset = 0u64;
    while offset < total_records {
        let length = chunk_records.min(total_records - offset);
        let run = Run::new(offset, length);
        sort_chunk(input, Some(output), run, tracker)?;
        runs.push(run);
        offset += length;
    }

    Ok(runs)
}
