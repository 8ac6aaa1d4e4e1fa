//! Remote bit storage: one backend key per sub-filter, write batching.
//!
//! Inserts only append to a pending queue; nothing reaches the backend
//! until flush(), which sends every queued "set bit to 1" as a single
//! pipelined batch and clears the queue. Lookups go straight to the
//! backend (GETBIT), so unflushed inserts are not yet visible.
//!
//! Construction is the one place that touches the whole partition: if the
//! key does not exist yet, every bit is zero-initialized (one zero_init
//! call, O(1) client memory) and an optional TTL applied before the
//! storage is returned.

use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use crate::backend::BitBackend;
use crate::metrics;

use super::BitStore;

pub struct RemoteStorage<B: BitBackend> {
    backend: B,
    key: String,
    nbits: u64,
    // Pending bit indices, cleared on successful flush. Mutex so that
    // concurrent insert and flush on one filter instance do not race.
    pending: Mutex<Vec<u64>>,
}

impl<B: BitBackend> RemoteStorage<B> {
    /// Open the storage under `key`, zero-initializing the key if it does
    /// not exist yet. Returns the storage and whether the key pre-existed
    /// (rejoining a shared filter vs creating a fresh one).
    pub fn open(backend: B, key: String, nbits: u64, expire_secs: Option<u64>) -> Result<(Self, bool)> {
        let existed = backend
            .exists(&key)
            .with_context(|| format!("check existence of {}", key))?;

        if !existed {
            if let Err(e) = backend.zero_init(&key, nbits) {
                metrics::record_backend_error();
                warn!("remote storage: zero-init of {} failed: {}", key, e);
                return Err(e).with_context(|| format!("zero-init {} ({} bits)", key, nbits));
            }
            if let Some(secs) = expire_secs {
                backend
                    .expire(&key, secs)
                    .with_context(|| format!("set expiry on {}", key))?;
            }
            metrics::record_remote_key_initialized();
            info!("remote storage: initialized key {} ({} bits)", key, nbits);
        } else {
            debug!("remote storage: rejoined existing key {}", key);
        }

        Ok((
            Self {
                backend,
                key,
                nbits,
                pending: Mutex::new(Vec::new()),
            },
            existed,
        ))
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<B: BitBackend> BitStore for RemoteStorage<B> {
    fn get(&self, bit: u64) -> Result<bool> {
        if bit >= self.nbits {
            return Err(anyhow!("bit {} out of range 0..{}", bit, self.nbits));
        }
        match self.backend.get_bit(&self.key, bit) {
            Ok(v) => Ok(v),
            Err(e) => {
                metrics::record_backend_error();
                warn!("remote storage: read of {} failed: {}", self.key, e);
                Err(e).with_context(|| format!("read bit {} of {}", bit, self.key))
            }
        }
    }

    fn queue(&self, bit: u64) {
        debug_assert!(bit < self.nbits);
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(bit);
        }
    }

    fn flush(&self) -> Result<u64> {
        let batch = {
            let mut pending = self
                .pending
                .lock()
                .map_err(|_| anyhow!("pending queue poisoned for {}", self.key))?;
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.backend.set_bits(&self.key, &batch, true) {
            metrics::record_backend_error();
            warn!("remote storage: flush of {} bits to {} failed: {}", batch.len(), self.key, e);
            // Put the batch back so a retried flush does not lose bits.
            if let Ok(mut pending) = self.pending.lock() {
                pending.extend_from_slice(&batch);
            }
            return Err(e).with_context(|| format!("flush {} bits to {}", batch.len(), self.key));
        }

        debug!("flushed {} bits to {}", batch.len(), self.key);
        Ok(batch.len() as u64)
    }
}
