//! Stable hashing utilities for filter values.
//!
//! Goals:
//! - Use a stable, explicit hash (not std::DefaultHasher) so bit positions
//!   are invariant across toolchains/platforms — a shared remote filter is
//!   only correct if every process derives the same indices.
//! - One cheap 64-bit digest per value; the two 32-bit halves feed the
//!   double-hashing construction (a + i*b), so k positions cost one hash.

use std::fmt;
use std::hash::Hasher;

use byteorder::{BigEndian, ByteOrder};
use twox_hash::XxHash64;

/// Type of stable hash used by the filter.
/// Kept as an explicit enum so the choice is part of the filter's schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashKind {
    /// 64-bit xxhash with seed=0. Fast and stable.
    Xx64Seed0,
}

impl fmt::Display for HashKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKind::Xx64Seed0 => write!(f, "xxhash64(seed=0)"),
        }
    }
}

/// Default hash kind for new filters.
pub const HASH_KIND_DEFAULT: HashKind = HashKind::Xx64Seed0;

/// The two 32-bit base values of the double-hashing construction,
/// widened to u64 so `a + i*b` cannot overflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashPair {
    pub a: u64,
    pub b: u64,
}

/// Compute the 64-bit stable digest of a value for a given kind.
///
/// Builds a disposable hasher per call: no shared mutable hash state,
/// safe under concurrent inserts.
#[inline]
pub fn hash64(kind: HashKind, value: &[u8]) -> u64 {
    match kind {
        HashKind::Xx64Seed0 => {
            let mut h = XxHash64::with_seed(0);
            h.write(value);
            h.finish()
        }
    }
}

/// Split one digest into the (a, b) base pair: big-endian digest bytes,
/// a = bytes [0..4], b = bytes [4..8].
#[inline]
pub fn hash_pair(kind: HashKind, value: &[u8]) -> HashPair {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, hash64(kind, value));
    HashPair {
        a: BigEndian::read_u32(&buf[0..4]) as u64,
        b: BigEndian::read_u32(&buf[4..8]) as u64,
    }
}
