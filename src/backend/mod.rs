//! backend — the bit-array backend seam consumed by remote storage.
//!
//! The trait is the abstract protocol surface of a Redis-style backend:
//! EXISTS / GETBIT / pipelined SETBIT batch / EXPIRE. Remote storage is
//! written against this trait, so the filter core stays testable without
//! a server.
//!
//! Implementations:
//! - MemoryBackend: in-process emulation (tests, local runs).
//! - RedisBackend: real Redis over an r2d2 pool (feature "redis").

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use self::redis::RedisBackend;

use anyhow::Result;

/// Atomic bit operations on named keys.
///
/// Every method is one logical round-trip; implementations acquire a
/// connection for the duration of the call and release it unconditionally
/// on return (scoped acquisition). No retries at this layer.
pub trait BitBackend: Send + Sync {
    /// Does the key already exist? (EXISTS)
    fn exists(&self, key: &str) -> Result<bool>;

    /// Create the key with `nbits` zeroed bits. Backends that extend a
    /// key on write only need to touch the last bit (SETBIT key nbits-1 0
    /// on Redis), so this stays O(1) in memory regardless of nbits.
    fn zero_init(&self, key: &str, nbits: u64) -> Result<()>;

    /// Read one bit. Bits never written read as 0. (GETBIT)
    fn get_bit(&self, key: &str, index: u64) -> Result<bool>;

    /// Write the given bit indices to `value` as one pipelined batch with
    /// a single sync point. (SETBIT × n + flush)
    fn set_bits(&self, key: &str, indices: &[u64], value: bool) -> Result<()>;

    /// Apply a TTL to the key. (EXPIRE)
    fn expire(&self, key: &str, seconds: u64) -> Result<()>;
}
