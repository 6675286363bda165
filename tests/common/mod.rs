#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;

use emsort::{RECORD_BYTES, Record};

pub fn write_records(path: &Path, values: &[Record]) {
    let mut bytes = Vec::with_capacity(values.len() * RECORD_BYTES);
    for v in values {
        bytes.extend_from_slice(&v.to_ne_bytes());
    }
    std::fs::write(path, bytes).expect("Failed to write record file");
}

pub fn read_records(path: &Path) -> Vec<Record> {
    std::fs::read(path)
        .expect("Failed to read record file")
        .chunks_exact(RECORD_BYTES)
        .map(|c| Record::from_ne_bytes(c.try_into().unwrap()))
        .collect()
}

pub fn is_sorted(values: &[Record]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

pub fn multiset(values: &[Record]) -> HashMap<Record, usize> {
    let mut counts = HashMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts
}

pub fn scratch_of(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".tmp_sort");
    std::path::PathBuf::from(name)
}
