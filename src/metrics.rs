//! Lightweight global metrics for bloomgate.
//!
//! Thread-safe atomic counters for the filter subsystems:
//! - insert path (values inserted, bits queued)
//! - exists path (probable hits vs definite misses)
//! - flush path (batches, bits written)
//! - remote storage (keys zero-initialized, backend errors observed)

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Insert path -----
static INSERTS_TOTAL: AtomicU64 = AtomicU64::new(0);
static BITS_QUEUED: AtomicU64 = AtomicU64::new(0);

// ----- Exists path -----
static EXISTS_HITS: AtomicU64 = AtomicU64::new(0);
static EXISTS_MISSES: AtomicU64 = AtomicU64::new(0);

// ----- Flush path -----
static FLUSH_CALLS: AtomicU64 = AtomicU64::new(0);
static FLUSH_BITS_WRITTEN: AtomicU64 = AtomicU64::new(0);

// ----- Remote storage -----
static REMOTE_KEYS_INITIALIZED: AtomicU64 = AtomicU64::new(0);
static BACKEND_ERRORS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    // Insert path
    pub inserts_total: u64,
    pub bits_queued: u64,

    // Exists path
    pub exists_hits: u64,
    pub exists_misses: u64,

    // Flush path
    pub flush_calls: u64,
    pub flush_bits_written: u64,

    // Remote storage
    pub remote_keys_initialized: u64,
    pub backend_errors: u64,
}

impl MetricsSnapshot {
    /// Share of exists() calls that came back "probably present".
    pub fn hit_ratio(&self) -> f64 {
        let total = self.exists_hits + self.exists_misses;
        if total == 0 {
            0.0
        } else {
            self.exists_hits as f64 / total as f64
        }
    }

    pub fn avg_flush_batch_bits(&self) -> f64 {
        if self.flush_calls == 0 {
            0.0
        } else {
            self.flush_bits_written as f64 / self.flush_calls as f64
        }
    }
}

// ----- Recorders (insert) -----
pub fn record_insert(bits_queued: u64) {
    INSERTS_TOTAL.fetch_add(1, Ordering::Relaxed);
    BITS_QUEUED.fetch_add(bits_queued, Ordering::Relaxed);
}

// ----- Recorders (exists) -----
pub fn record_exists_hit() {
    EXISTS_HITS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_exists_miss() {
    EXISTS_MISSES.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (flush) -----
pub fn record_flush(bits_written: u64) {
    FLUSH_CALLS.fetch_add(1, Ordering::Relaxed);
    FLUSH_BITS_WRITTEN.fetch_add(bits_written, Ordering::Relaxed);
}

// ----- Recorders (remote) -----
pub fn record_remote_key_initialized() {
    REMOTE_KEYS_INITIALIZED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_backend_error() {
    BACKEND_ERRORS.fetch_add(1, Ordering::Relaxed);
}

// ----- Snapshot / Reset -----
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        inserts_total: INSERTS_TOTAL.load(Ordering::Relaxed),
        bits_queued: BITS_QUEUED.load(Ordering::Relaxed),

        exists_hits: EXISTS_HITS.load(Ordering::Relaxed),
        exists_misses: EXISTS_MISSES.load(Ordering::Relaxed),

        flush_calls: FLUSH_CALLS.load(Ordering::Relaxed),
        flush_bits_written: FLUSH_BITS_WRITTEN.load(Ordering::Relaxed),

        remote_keys_initialized: REMOTE_KEYS_INITIALIZED.load(Ordering::Relaxed),
        backend_errors: BACKEND_ERRORS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    INSERTS_TOTAL.store(0, Ordering::Relaxed);
    BITS_QUEUED.store(0, Ordering::Relaxed);

    EXISTS_HITS.store(0, Ordering::Relaxed);
    EXISTS_MISSES.store(0, Ordering::Relaxed);

    FLUSH_CALLS.store(0, Ordering::Relaxed);
    FLUSH_BITS_WRITTEN.store(0, Ordering::Relaxed);

    REMOTE_KEYS_INITIALIZED.store(0, Ordering::Relaxed);
    BACKEND_ERRORS.store(0, Ordering::Relaxed);
}
