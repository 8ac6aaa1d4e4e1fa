//! Partitioned Bloom filter core.
//!
//! Layout: k sub-filters, one per hash iteration, each owning a disjoint
//! partition of ceil(m/k) bits. Positions come from the double-hashing
//! construction (Kirsch–Mitzenmacher): one 64-bit digest per value is
//! split into 32-bit halves (a, b), and sub-filter i uses
//! `(a + i*b) mod partition_size`. Statistically equivalent to k
//! independent hash functions at a fraction of the cost.
//!
//! Consistency:
//! - insert() only queues bits; with remote storage nothing is visible to
//!   exists() until flush().
//! - flush() fans out to all sub-filters concurrently, joins, and returns
//!   the first error instead of dropping it.
//! - k and size are schema for a remote base key: reopening an existing
//!   key set with different parameters corrupts membership semantics.

use std::thread;

use anyhow::{anyhow, Result};

use crate::backend::BitBackend;
use crate::hash::{hash_pair, HashKind, HashPair, HASH_KIND_DEFAULT};
use crate::metrics;
use crate::storage::{BitStore, BitsetStorage, RemoteStorage};

/// One partition plus its positional multiplier.
struct SubFilter {
    /// Bits addressable in this partition: ceil(m/k), same for all k.
    size: u64,
    /// Distinct per sub-filter, 1..=k.
    multiplier: u64,
    storage: Box<dyn BitStore>,
}

impl SubFilter {
    /// Bit index of a value inside this partition.
    #[inline]
    fn bit_index(&self, pair: HashPair) -> u64 {
        (pair.a + self.multiplier * pair.b) % self.size
    }
}

/// Partitioned Bloom filter over k sub-filters.
///
/// Insert-only: no deletion, no resizing, no merging. False positives are
/// an accepted, quantifiable property; false negatives do not occur for
/// values inserted and flushed under an unchanged configuration.
pub struct BloomFilter {
    subs: Vec<SubFilter>,
    hash_kind: HashKind,
}

/// Partition descriptors before storage is attached: (size, multiplier).
fn filter_setup(size: u64, hash_iter: u32) -> Vec<(u64, u64)> {
    assert!(size > 0, "filter size must be > 0");
    assert!(hash_iter > 0, "hash iterations must be > 0");
    let partition = size.div_ceil(hash_iter as u64);
    (1..=hash_iter as u64).map(|m| (partition, m)).collect()
}

impl BloomFilter {
    /// In-memory filter: one fresh bit vector per sub-filter.
    /// Always succeeds, no I/O.
    pub fn new_bitset(size: u64, hash_iter: u32) -> Self {
        let subs = filter_setup(size, hash_iter)
            .into_iter()
            .map(|(size, multiplier)| SubFilter {
                size,
                multiplier,
                storage: Box::new(BitsetStorage::new(size)),
            })
            .collect();
        Self {
            subs,
            hash_kind: HASH_KIND_DEFAULT,
        }
    }

    /// Shared remote filter: one backend key per sub-filter, named
    /// `<base_key>.<multiplier>`. Fresh keys are zero-initialized (with
    /// optional TTL); setup short-circuits on the first I/O error.
    ///
    /// The returned bool reports whether the last checked key pre-existed,
    /// distinguishing "fresh filter" from "rejoining an existing one".
    pub fn new_remote<B>(
        backend: &B,
        base_key: &str,
        size: u64,
        hash_iter: u32,
        expire_secs: Option<u64>,
    ) -> Result<(Self, bool)>
    where
        B: BitBackend + Clone + 'static,
    {
        let mut subs = Vec::with_capacity(hash_iter as usize);
        let mut existed = false;
        for (size, multiplier) in filter_setup(size, hash_iter) {
            let key = format!("{}.{}", base_key, multiplier);
            let (storage, key_existed) =
                RemoteStorage::open(backend.clone(), key, size, expire_secs)?;
            existed = key_existed;
            subs.push(SubFilter {
                size,
                multiplier,
                storage: Box::new(storage),
            });
        }
        Ok((
            Self {
                subs,
                hash_kind: HASH_KIND_DEFAULT,
            },
            existed,
        ))
    }

    /// Number of hash iterations (k).
    pub fn hash_iterations(&self) -> u32 {
        self.subs.len() as u32
    }

    /// Bits per partition: ceil(size / k).
    pub fn partition_size(&self) -> u64 {
        self.subs.first().map(|f| f.size).unwrap_or(0)
    }

    /// Queue the value's bit in every sub-filter. With remote storage no
    /// I/O happens here; call flush() to persist.
    pub fn insert(&self, value: &[u8]) {
        let pair = hash_pair(self.hash_kind, value);
        for f in &self.subs {
            f.storage.queue(f.bit_index(pair));
        }
        metrics::record_insert(self.subs.len() as u64);
    }

    /// insert() for each value. Repeated bit indices are harmless: the
    /// backend set-bit operation is idempotent.
    pub fn insert_many<V: AsRef<[u8]>>(&self, values: &[V]) {
        for v in values {
            self.insert(v.as_ref());
        }
    }

    /// Flush every sub-filter's queued bits, one concurrent unit per
    /// sub-filter, joined before returning. The first failure (if any) is
    /// returned; remaining units still run to completion.
    pub fn flush(&self) -> Result<()> {
        let mut first_err = None;
        let mut bits_written = 0u64;

        thread::scope(|s| {
            let handles: Vec<_> = self
                .subs
                .iter()
                .map(|f| s.spawn(move || f.storage.flush()))
                .collect();
            for h in handles {
                match h.join() {
                    Ok(Ok(n)) => bits_written += n,
                    Ok(Err(e)) => {
                        if first_err.is_none() {
                            first_err = Some(e);
                        }
                    }
                    Err(_) => {
                        if first_err.is_none() {
                            first_err = Some(anyhow!("flush worker panicked"));
                        }
                    }
                }
            }
        });

        metrics::record_flush(bits_written);
        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Membership test. Ok(false) means definitely not present; Ok(true)
    /// means probably present (false positives possible). Sub-filters are
    /// visited in construction order and the first unset bit
    /// short-circuits. An I/O error aborts immediately.
    pub fn exists(&self, value: &[u8]) -> Result<bool> {
        let pair = hash_pair(self.hash_kind, value);
        for f in &self.subs {
            if !f.storage.get(f.bit_index(pair))? {
                metrics::record_exists_miss();
                return Ok(false);
            }
        }
        metrics::record_exists_hit();
        Ok(true)
    }

    /// exists() for each value, results parallel-indexed with the input.
    /// The first I/O error aborts the whole batch.
    pub fn exists_many<V: AsRef<[u8]>>(&self, values: &[V]) -> Result<Vec<bool>> {
        let mut out = Vec::with_capacity(values.len());
        for v in values {
            out.push(self.exists(v.as_ref())?);
        }
        Ok(out)
    }

    /// Record-then-persist composite: insert_many + flush.
    pub fn load<V: AsRef<[u8]>>(&self, values: &[V]) -> Result<()> {
        self.insert_many(values);
        self.flush()
    }
}
