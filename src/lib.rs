// External multi-way merge sort for flat files of 64-bit integers.

/// A record is a native-endian signed 64-bit integer; the file is a flat
/// sequence of them with no framing.
pub type Record = i64;

/// Width of one record on disk, in bytes.
pub const RECORD_BYTES: usize = std::mem::size_of::<Record>();

/// Statistics about one completed sort.
#[derive(Clone, Debug)]
pub struct SortStats {
    pub total_records: u64,
    pub file_bytes: u64,
    pub memory_budget: usize,
    pub fan_in: usize,
    pub initial_runs: usize,
    pub merge_passes: usize,
    pub copied_back: bool,
    pub run_generation_time_ms: u128,
    pub merge_time_ms: u128,
    pub io_stats: Option<IoStats>,
}

impl std::fmt::Display for SortStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "SortStats:")?;
        writeln!(
            f,
            "  Records: {} ({} bytes)",
            self.total_records, self.file_bytes
        )?;
        writeln!(
            f,
            "  Memory budget: {:.2} MiB, fan-in: {}",
            self.memory_budget as f64 / (1024.0 * 1024.0),
            self.fan_in
        )?;
        writeln!(f, "  Initial runs: {}", self.initial_runs)?;
        writeln!(
            f,
            "  Merge passes: {} (copy-back: {})",
            self.merge_passes,
            if self.copied_back { "yes" } else { "no" }
        )?;
        writeln!(f, "  (R) time: {} ms", self.run_generation_time_ms)?;
        writeln!(f, "  (M) time: {} ms", self.merge_time_ms)?;
        if let Some(io) = &self.io_stats {
            writeln!(f, "  I/O stats: {}", io)?;
        }
        Ok(())
    }
}

/// Final state of a sort invocation.
#[derive(Clone, Debug)]
pub enum SortOutcome {
    /// The file was detected as sorted (trivially or by the sparse probe)
    /// and was not rewritten.
    AlreadySorted,
    Sorted(SortStats),
}

impl SortOutcome {
    pub fn is_already_sorted(&self) -> bool {
        matches!(self, SortOutcome::AlreadySorted)
    }
}

pub mod diskio;
pub mod generate;
pub mod sort;
pub mod verify;

// Export the main types
pub use diskio::file::FileHandle;
pub use diskio::io_stats::{IoStats, IoStatsTracker};
pub use diskio::mmap::MappedRegion;
pub use generate::generate_file;
pub use sort::run::{Run, RunCursor};
pub use sort::sorter::{ExternalSorter, sort_file};
pub use verify::{CheckOutcome, check_file};
