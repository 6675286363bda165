use std::io;

use crate::diskio::file::FileHandle;
use crate::diskio::io_stats::IoStatsTracker;
use crate::sort::merge::merge_runs;
use crate::sort::run::Run;

/// Smallest per-run buffer share worth merging with; budgets below twice
/// this force a binary merge so a pass always makes progress.
const MIN_MERGE_BUFFER: usize = 16 * 1024;

/// Maximum number of runs merged in one merger invocation under the given
/// budget: every participant keeps at least a `MIN_MERGE_BUFFER` share,
/// clamped to [2, 1024].
pub fn fan_in(mem_bytes: usize) -> usize {
    if mem_bytes < MIN_MERGE_BUFFER * 2 {
        return 2;
    }
    (mem_bytes / MIN_MERGE_BUFFER - 1).clamp(2, 1024)
}

/// Merge consecutive groups of at most `max_k` runs from `input` into
/// `output`, each group's output contiguous after the previous group's.
/// Returns the new run list, one run per group, in group order.
pub fn merge_pass(
    input: &FileHandle,
    output: &FileHandle,
    runs: &[Run],
    mem_bytes: usize,
    max_k: usize,
    tracker: Option<&IoStatsTracker>,
) -> io::Result<Vec<Run>> {
    let mut next_runs = Vec::with_capacity(runs.len().div_ceil(max_k));
    let mut out_offset = 0u64;

    for group in runs.chunks(max_k) {
        let total: u64 = group.iter().map(|r| r.length).sum();
        merge_runs(input, output, group, out_offset, mem_bytes, tracker)?;
        next_runs.push(Run::new(out_offset, total));
        out_offset += total;
    }

    Ok(next_runs)
}
