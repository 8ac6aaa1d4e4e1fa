//! In-process bit-array backend.
//!
//! Emulates the remote protocol over a shared byte-array map. Cloning the
//! backend shares the underlying state, which mirrors how a connection
//! pool is shared between storages — two filters built over clones of one
//! MemoryBackend see the same keys, like two processes over one server.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::BitBackend;

/// Shared in-memory backend. Cheap to clone (Arc inside).
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    keys: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all keys currently present, sorted.
    pub fn key_names(&self) -> Result<Vec<String>> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        let mut names: Vec<String> = keys.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Byte length of a key's bit array, if the key exists.
    pub fn key_len_bytes(&self, key: &str) -> Result<Option<usize>> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        Ok(keys.get(key).map(|v| v.len()))
    }

    /// Full dump of the key space (tests compare filter states with this).
    pub fn dump(&self) -> Result<HashMap<String, Vec<u8>>> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        Ok(keys.clone())
    }
}

impl BitBackend for MemoryBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        Ok(keys.contains_key(key))
    }

    fn zero_init(&self, key: &str, nbits: u64) -> Result<()> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        keys.insert(key.to_string(), vec![0u8; nbits.div_ceil(8) as usize]);
        Ok(())
    }

    fn get_bit(&self, key: &str, index: u64) -> Result<bool> {
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        let Some(bytes) = keys.get(key) else {
            return Ok(false);
        };
        let byte = (index / 8) as usize;
        if byte >= bytes.len() {
            return Ok(false);
        }
        // Redis bit order: most significant bit of the byte is offset 0.
        let mask = 0x80u8 >> (index % 8);
        Ok(bytes[byte] & mask != 0)
    }

    fn set_bits(&self, key: &str, indices: &[u64], value: bool) -> Result<()> {
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        let bytes = keys.entry(key.to_string()).or_default();
        for &index in indices {
            let byte = (index / 8) as usize;
            if byte >= bytes.len() {
                bytes.resize(byte + 1, 0);
            }
            let mask = 0x80u8 >> (index % 8);
            if value {
                bytes[byte] |= mask;
            } else {
                bytes[byte] &= !mask;
            }
        }
        Ok(())
    }

    fn expire(&self, key: &str, _seconds: u64) -> Result<()> {
        // TTLs are not simulated; existence is all the filter relies on.
        let keys = self
            .keys
            .lock()
            .map_err(|_| anyhow!("memory backend poisoned"))?;
        if keys.contains_key(key) {
            Ok(())
        } else {
            Err(anyhow!("expire on missing key {}", key))
        }
    }
}
