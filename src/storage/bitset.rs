//! Fixed-size in-memory bit vector over atomic words.
//!
//! Bits are applied at queue() time with a relaxed fetch_or, so inserts
//! and lookups work through &self and the filter stays Send + Sync
//! without a lock on the hot path.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{anyhow, Result};

use super::BitStore;

pub struct BitsetStorage {
    nbits: u64,
    words: Box<[AtomicU64]>,
}

impl BitsetStorage {
    /// Allocate a zeroed bit vector of `nbits` bits. No failure mode.
    pub fn new(nbits: u64) -> Self {
        let nwords = nbits.div_ceil(64) as usize;
        let mut words = Vec::with_capacity(nwords);
        words.extend((0..nwords).map(|_| AtomicU64::new(0)));
        Self {
            nbits,
            words: words.into_boxed_slice(),
        }
    }

    pub fn len_bits(&self) -> u64 {
        self.nbits
    }
}

impl BitStore for BitsetStorage {
    fn get(&self, bit: u64) -> Result<bool> {
        if bit >= self.nbits {
            return Err(anyhow!("bit {} out of range 0..{}", bit, self.nbits));
        }
        let word = self.words[(bit / 64) as usize].load(Ordering::Relaxed);
        Ok(word & (1u64 << (bit % 64)) != 0)
    }

    fn queue(&self, bit: u64) {
        // Partition indices come from `mod nbits`; anything else is a bug.
        debug_assert!(bit < self.nbits);
        if bit < self.nbits {
            self.words[(bit / 64) as usize].fetch_or(1u64 << (bit % 64), Ordering::Relaxed);
        }
    }

    fn flush(&self) -> Result<u64> {
        // Already applied at queue() time.
        Ok(0)
    }
}
