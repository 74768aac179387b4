//! MAPQUEUE - Engine Metrics & Observability
//! Atomic counters for tracking engine operations in a lock-free,
//! thread-safe manner using `AtomicU64`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters shared by the Map and Queue engines.
///
/// All counters use `Ordering::Relaxed`; they are for observation only.
#[derive(Debug)]
pub struct EngineMetrics {
    /// Versions appended, tombstones included.
    pub puts: AtomicU64,
    /// Point-in-time lookups.
    pub gets: AtomicU64,
    /// Tombstone versions appended.
    pub tombstones: AtomicU64,
    /// Values added to a queue.
    pub adds: AtomicU64,
    /// Values popped from a queue.
    pub pops: AtomicU64,
    /// Stored bytes written (encoded key + packed payload).
    pub bytes_written: AtomicU64,
    /// Stored bytes returned by lookups.
    pub bytes_read: AtomicU64,
    /// Log frames replayed while opening a durable engine.
    pub recovered: AtomicU64,
    engine_started: Instant,
}

impl EngineMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            puts: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            tombstones: AtomicU64::new(0),
            adds: AtomicU64::new(0),
            pops: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            bytes_read: AtomicU64::new(0),
            recovered: AtomicU64::new(0),
            engine_started: Instant::now(),
        }
    }

    /// Record an appended version.
    pub fn record_put(&self, key_size: usize, payload_size: usize) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if payload_size == 0 {
            self.tombstones.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_written
            .fetch_add((key_size + payload_size) as u64, Ordering::Relaxed);
    }

    /// Record a lookup and the stored size it returned, if any.
    pub fn record_get(&self, payload_size: Option<usize>) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if let Some(size) = payload_size {
            self.bytes_read.fetch_add(size as u64, Ordering::Relaxed);
        }
    }

    pub fn record_add(&self) {
        self.adds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pop(&self) {
        self.pops.fetch_add(1, Ordering::Relaxed);
    }

    /// Record frames replayed during recovery.
    pub fn record_recovered(&self, frames: usize) {
        self.recovered.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Get engine uptime in seconds.
    pub fn uptime_secs(&self) -> f64 {
        self.engine_started.elapsed().as_secs_f64()
    }

    /// Total operations (puts + gets + adds + pops).
    pub fn total_ops(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
            + self.gets.load(Ordering::Relaxed)
            + self.adds.load(Ordering::Relaxed)
            + self.pops.load(Ordering::Relaxed)
    }

    /// Format metrics as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "Operations:\n\
             \x20 puts:       {}\n\
             \x20 tombstones: {}\n\
             \x20 gets:       {}\n\
             \x20 adds:       {}\n\
             \x20 pops:       {}\n\
             I/O:\n\
             \x20 written:    {} bytes\n\
             \x20 read:       {} bytes\n\
             Recovery:\n\
             \x20 frames:     {}\n\
             Uptime: {:.2}s",
            self.puts.load(Ordering::Relaxed),
            self.tombstones.load(Ordering::Relaxed),
            self.gets.load(Ordering::Relaxed),
            self.adds.load(Ordering::Relaxed),
            self.pops.load(Ordering::Relaxed),
            self.bytes_written.load(Ordering::Relaxed),
            self.bytes_read.load(Ordering::Relaxed),
            self.recovered.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operations() {
        let m = EngineMetrics::new();

        m.record_put(24, 10);
        m.record_put(24, 0);
        m.record_get(Some(10));
        m.record_get(None);
        m.record_add();
        m.record_pop();

        assert_eq!(m.puts.load(Ordering::Relaxed), 2);
        assert_eq!(m.tombstones.load(Ordering::Relaxed), 1);
        assert_eq!(m.gets.load(Ordering::Relaxed), 2);
        assert_eq!(m.bytes_written.load(Ordering::Relaxed), 58);
        assert_eq!(m.bytes_read.load(Ordering::Relaxed), 10);
        assert_eq!(m.total_ops(), 6);
    }

    #[test]
    fn test_report_format() {
        let m = EngineMetrics::default();
        m.record_put(24, 8);
        let report = m.report();
        assert!(report.contains("puts:"));
        assert!(report.contains("tombstones:"));
        assert!(report.contains("written:"));
    }
}
