//! storage — per-sub-filter bit storage.
//!
//! Each sub-filter owns exactly one BitStore. Two implementations:
//! - BitsetStorage: in-process atomic bit vector; queue applies
//!   immediately, flush is a no-op.
//! - RemoteStorage: pending queue + one pipelined batch per flush against
//!   a BitBackend key.

mod bitset;
mod remote;

pub use bitset::BitsetStorage;
pub use remote::RemoteStorage;

use anyhow::Result;

/// Bit storage capability of one sub-filter partition.
///
/// All methods take &self: implementations use atomics or a mutex so a
/// filter instance can be shared across threads. A queued bit becomes
/// visible to get() no later than after a successful flush() (the bitset
/// variant makes it visible immediately).
pub trait BitStore: Send + Sync {
    /// Read one bit of the partition.
    fn get(&self, bit: u64) -> Result<bool>;

    /// Record that this bit must be set to 1. May apply immediately or
    /// stay pending until flush().
    fn queue(&self, bit: u64);

    /// Make all queued bits durable/visible. Returns how many bits were
    /// written by this call.
    fn flush(&self) -> Result<u64>;
}
