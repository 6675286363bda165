use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Byte and operation counters accumulated over one sort.
#[derive(Clone, Debug, Default)]
pub struct IoStats {
    pub read_ops: u64,
    pub read_bytes: u64,
    pub write_ops: u64,
    pub write_bytes: u64,
}

impl std::fmt::Display for IoStats {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "reads={} ({:.2} MiB), writes={} ({:.2} MiB)",
            self.read_ops,
            self.read_bytes as f64 / (1024.0 * 1024.0),
            self.write_ops,
            self.write_bytes as f64 / (1024.0 * 1024.0)
        )
    }
}

/// Cloneable handle to shared I/O counters; every clone observes the same
/// totals.
#[derive(Clone, Default)]
pub struct IoStatsTracker {
    inner: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    read_ops: AtomicU64,
    read_bytes: AtomicU64,
    write_ops: AtomicU64,
    write_bytes: AtomicU64,
}

impl IoStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_read(&self, bytes: u64) {
        self.inner.read_ops.fetch_add(1, Ordering::Relaxed);
        self.inner.read_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn track_write(&self, bytes: u64) {
        self.inner.write_ops.fetch_add(1, Ordering::Relaxed);
        self.inner.write_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn get_read_stats(&self) -> (u64, u64) {
        (
            self.inner.read_ops.load(Ordering::Relaxed),
            self.inner.read_bytes.load(Ordering::Relaxed),
        )
    }

    pub fn get_write_stats(&self) -> (u64, u64) {
        (
            self.inner.write_ops.load(Ordering::Relaxed),
            self.inner.write_bytes.load(Ordering::Relaxed),
        )
    }

    pub fn get_detailed_stats(&self) -> IoStats {
        IoStats {
            read_ops: self.inner.read_ops.load(Ordering::Relaxed),
            read_bytes: self.inner.read_bytes.load(Ordering::Relaxed),
            write_ops: self.inner.write_ops.load(Ordering::Relaxed),
            write_bytes: self.inner.write_bytes.load(Ordering::Relaxed),
        }
    }
}
