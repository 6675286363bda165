use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::diskio::file::FileHandle;
use crate::diskio::io_stats::IoStatsTracker;
use crate::diskio::mmap::page_size;
use crate::sort::pass::{fan_in, merge_pass};
use crate::sort::run_generation::create_initial_runs;
use crate::{RECORD_BYTES, Record, SortOutcome, SortStats};

/// Number of evenly spaced records probed by the already-sorted fast path.
const SORTED_PROBE_SAMPLES: u64 = 1000;

/// Chunk size for the final scratch-to-original copy.
const COPY_BACK_CHUNK: usize = 1 << 20;

/// Suffix appended to the input path for the scratch file.
const SCRATCH_SUFFIX: &str = ".tmp_sort";

/// The two files a sort ping-pongs between. The flag tracks which physical
/// file holds the newest generation of runs; the terminal copy-back
/// decision is derived from it after the last pass.
struct PingPong<'a> {
    original: &'a FileHandle,
    scratch: &'a FileHandle,
    scratch_holds_data: bool,
}

impl<'a> PingPong<'a> {
    fn new(original: &'a FileHandle, scratch: &'a FileHandle) -> Self {
        // Initial runs are written into the scratch file.
        Self {
            original,
            scratch,
            scratch_holds_data: true,
        }
    }

    fn input(&self) -> &'a FileHandle {
        if self.scratch_holds_data {
            self.scratch
        } else {
            self.original
        }
    }

    fn output(&self) -> &'a FileHandle {
        if self.scratch_holds_data {
            self.original
        } else {
            self.scratch
        }
    }

    fn swap(&mut self) {
        self.scratch_holds_data = !self.scratch_holds_data;
    }

    fn sorted_data_in_scratch(&self) -> bool {
        self.scratch_holds_data
    }
}

/// Top-level driver: validates the file, picks a memory budget, builds
/// initial runs in a scratch file, then ping-pongs merge passes between
/// the two files until a single run remains.
pub struct ExternalSorter {
    memory_budget: Option<usize>,
}

impl ExternalSorter {
    /// Sorter with the default budget: one tenth of the file size, floored
    /// at one page.
    pub fn new() -> Self {
        Self {
            memory_budget: None,
        }
    }

    /// Sorter with an explicit budget in bytes.
    pub fn with_memory_budget(bytes: usize) -> Self {
        Self {
            memory_budget: Some(bytes),
        }
    }

    /// Sorter with an explicit budget in MiB, as exposed on the command
    /// line.
    pub fn with_memory_limit_mb(mb: usize) -> Self {
        Self::with_memory_budget(mb * 1024 * 1024)
    }

    /// Sort the file at `path` in place: same byte size, same path, records
    /// ascending. Returns without touching the file when it is (or probes
    /// as) already sorted.
    pub fn sort(&self, path: impl AsRef<Path>) -> Result<SortOutcome, String> {
        let path = path.as_ref();
        let file = FileHandle::open_rw(path)
            .map_err(|e| format!("cannot open {}: {}", path.display(), e))?;
        let file_bytes = file
            .size()
            .map_err(|e| format!("cannot stat {}: {}", path.display(), e))?;

        if file_bytes % RECORD_BYTES as u64 != 0 {
            return Err(format!(
                "{}: size {} is not a multiple of {} bytes",
                path.display(),
                file_bytes,
                RECORD_BYTES
            ));
        }
        let total_records = file_bytes / RECORD_BYTES as u64;
        if total_records <= 1 {
            println!("File has {} element(s), already sorted.", total_records);
            return Ok(SortOutcome::AlreadySorted);
        }

        println!("Checking if the file is already sorted...");
        let probed_sorted = probe_sorted(&file, total_records)
            .map_err(|e| format!("cannot sample {}: {}", path.display(), e))?;
        if probed_sorted {
            println!("File is already sorted. Skipping sorting.");
            return Ok(SortOutcome::AlreadySorted);
        }

        let memory_budget = self.resolve_budget(file_bytes);
        println!(
            "File has {} elements ({} bytes). Using up to {:.2} MiB of mapped buffers.",
            total_records,
            file_bytes,
            memory_budget as f64 / (1024.0 * 1024.0)
        );
        println!("Starting external multi-way mergesort...");

        let stats = sort_with_scratch(path, &file, file_bytes, total_records, memory_budget)
            .map_err(|e| format!("sorting {} failed: {}", path.display(), e))?;
        println!("Sorting complete.");
        Ok(SortOutcome::Sorted(stats))
    }

    fn resolve_budget(&self, file_bytes: u64) -> usize {
        match self.memory_budget {
            Some(bytes) => bytes,
            None => ((file_bytes / 10) as usize).max(page_size()),
        }
    }
}

impl Default for ExternalSorter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper: sort with an optional MiB limit.
pub fn sort_file(path: impl AsRef<Path>, memory_limit_mb: Option<usize>) -> Result<SortOutcome, String> {
    let sorter = match memory_limit_mb {
        Some(mb) => ExternalSorter::with_memory_limit_mb(mb),
        None => ExternalSorter::new(),
    };
    sorter.sort(path)
}

/// Scratch file path for `path`.
pub fn scratch_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(SCRATCH_SUFFIX);
    PathBuf::from(name)
}

fn sort_with_scratch(
    path: &Path,
    file: &FileHandle,
    file_bytes: u64,
    total_records: u64,
    memory_budget: usize,
) -> io::Result<SortStats> {
    let tracker = IoStatsTracker::new();

    // Same-size scratch file, unlinked when the handle drops.
    let scratch = FileHandle::create_scratch(scratch_path(path))?;
    scratch.truncate(file_bytes)?;

    let chunk_bytes = memory_budget.max(RECORD_BYTES);
    let run_gen_start = Instant::now();
    let mut runs = create_initial_runs(file, &scratch, total_records, chunk_bytes, Some(&tracker))?;
    let run_generation_time_ms = run_gen_start.elapsed().as_millis();
    let initial_runs = runs.len();
    println!(
        "Generated {} initial runs in {} ms",
        initial_runs, run_generation_time_ms
    );

    let max_k = fan_in(memory_budget);
    let mut roles = PingPong::new(file, &scratch);
    let mut merge_passes = 0;
    let merge_start = Instant::now();

    while runs.len() > 1 {
        // The pass maps output ranges up to the full file size, so the
        // target must already be that large.
        roles.output().truncate(file_bytes)?;
        runs = merge_pass(
            roles.input(),
            roles.output(),
            &runs,
            memory_budget,
            max_k,
            Some(&tracker),
        )?;
        roles.swap();
        merge_passes += 1;
        println!(
            "Merge pass {} complete, {} run(s) remain",
            merge_passes,
            runs.len()
        );
    }

    let copied_back = roles.sorted_data_in_scratch();
    if copied_back {
        copy_back(&scratch, file, file_bytes, Some(&tracker))?;
    }
    let merge_time_ms = merge_start.elapsed().as_millis();

    Ok(SortStats {
        total_records,
        file_bytes,
        memory_budget,
        fan_in: max_k,
        initial_runs,
        merge_passes,
        copied_back,
        run_generation_time_ms,
        merge_time_ms,
        io_stats: Some(tracker.get_detailed_stats()),
    })
}

/// Sparse monotonicity probe over up to `SORTED_PROBE_SAMPLES` evenly
/// spaced records (stride = total/1000, at least 1). A monotonic sample
/// declares the file sorted; disorder strictly between probed positions
/// goes undetected. This is a heuristic, not a proof; the exact answer is
/// the checker's full linear scan.
fn probe_sorted(file: &FileHandle, total_records: u64) -> io::Result<bool> {
    let stride = (total_records / SORTED_PROBE_SAMPLES).max(1);
    let mut prev: Option<Record> = None;
    let mut buf = [0u8; RECORD_BYTES];

    let mut index = 0u64;
    while index < total_records {
        file.read_exact_at(&mut buf, index * RECORD_BYTES as u64)?;
        let value = Record::from_ne_bytes(buf);
        if let Some(prev) = prev {
            if value < prev {
                return Ok(false);
            }
        }
        prev = Some(value);
        index += stride;
    }
    Ok(true)
}

/// Copy the scratch file back over the original in bounded chunks. Short
/// reads are errors, not end-of-stream: the loop finishes only after
/// exactly `file_bytes` bytes have moved.
fn copy_back(
    scratch: &FileHandle,
    original: &FileHandle,
    file_bytes: u64,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<()> {
    let mut buf = vec![0u8; COPY_BACK_CHUNK];
    let mut copied = 0u64;
    while copied < file_bytes {
        let n = ((file_bytes - copied) as usize).min(COPY_BACK_CHUNK);
        scratch.read_exact_at(&mut buf[..n], copied)?;
        original.write_all_at(&buf[..n], copied)?;
        if let Some(t) = tracker {
            t.track_read(n as u64);
            t.track_write(n as u64);
        }
        copied += n as u64;
    }
    Ok(())
}
