use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use rand::Rng;

use crate::Record;

/// Records generated per buffered write in the unsorted case.
const GEN_BATCH_RECORDS: usize = 1 << 20;

/// Write `count` uniformly random records to `path`, replacing any existing
/// file. With `sorted` the records are sorted before writing, which needs
/// the whole dataset in memory; the unsorted case streams in batches.
pub fn generate_file(path: impl AsRef<Path>, count: u64, sorted: bool) -> io::Result<()> {
    let mut rng = rand::rng();
    let mut writer = BufWriter::new(File::create(path.as_ref())?);

    if sorted {
        let mut data: Vec<Record> = (0..count).map(|_| rng.random()).collect();
        data.sort_unstable();
        for value in &data {
            writer.write_all(&value.to_ne_bytes())?;
        }
    } else {
        let mut remaining = count;
        while remaining > 0 {
            let batch = remaining.min(GEN_BATCH_RECORDS as u64);
            for _ in 0..batch {
                let value: Record = rng.random();
                writer.write_all(&value.to_ne_bytes())?;
            }
            remaining -= batch;
        }
    }

    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RECORD_BYTES;
    use tempfile::TempDir;

    #[test]
    fn test_generates_exact_record_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("random.dat");

        generate_file(&path, 1234, false).unwrap();

        let bytes = std::fs::metadata(&path).unwrap().len();
        assert_eq!(bytes, 1234 * RECORD_BYTES as u64);
    }

    #[test]
    fn test_sorted_output_is_sorted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sorted.dat");

        generate_file(&path, 2000, true).unwrap();

        let values: Vec<Record> = std::fs::read(&path)
            .unwrap()
            .chunks_exact(RECORD_BYTES)
            .map(|c| Record::from_ne_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(values.len(), 2000);
        assert!(values.is_sorted());
    }

    #[test]
    fn test_zero_records_gives_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.dat");

        generate_file(&path, 0, false).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
