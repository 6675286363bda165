use std::path::Path;

use crate::diskio::file::FileHandle;
use crate::{RECORD_BYTES, Record};

/// Records compared per read while scanning.
const SCAN_CHUNK_RECORDS: usize = 1 << 15;

/// Result of a full linear sortedness scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Sorted,
    /// First adjacent inversion: the record at `index` is smaller than its
    /// predecessor.
    Unsorted {
        index: u64,
        previous: Record,
        value: Record,
    },
}

/// Scan the whole file in fixed-size chunks and report whether its records
/// are non-decreasing. Unlike the sorter's sparse probe this is exact.
pub fn check_file(path: impl AsRef<Path>) -> Result<CheckOutcome, String> {
    let path = path.as_ref();
    let file = FileHandle::open_readonly(path)
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
    let total = file_bytes / RECORD_BYTES as u64;
    if total < 2 {
        return Ok(CheckOutcome::Sorted);
    }

    let mut buf = vec![0u8; SCAN_CHUNK_RECORDS * RECORD_BYTES];
    let mut prev: Option<Record> = None;
    let mut index = 0u64;

    while index < total {
        let n = SCAN_CHUNK_RECORDS.min((total - index) as usize);
        file.read_exact_at(&mut buf[..n * RECORD_BYTES], index * RECORD_BYTES as u64)
            .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;

        for (i, chunk) in buf[..n * RECORD_BYTES].chunks_exact(RECORD_BYTES).enumerate() {
            let value = Record::from_ne_bytes(chunk.try_into().expect("chunk is record-sized"));
            if let Some(previous) = prev {
                if value < previous {
                    return Ok(CheckOutcome::Unsorted {
                        index: index + i as u64,
                        previous,
                        value,
                    });
                }
            }
            prev = Some(value);
        }
        index += n as u64;
    }

    Ok(CheckOutcome::Sorted)
}
