// Base modules
pub mod hash;
pub mod metrics;

// Storage layers
pub mod backend; // src/backend/{mod,memory,redis}.rs
pub mod storage; // src/storage/{mod,bitset,remote}.rs

// Filter core
pub mod filter; // src/filter.rs

// Convenience re-exports
pub use backend::{BitBackend, MemoryBackend};
#[cfg(feature = "redis")]
pub use backend::RedisBackend;
pub use filter::BloomFilter;
pub use hash::{HashKind, HASH_KIND_DEFAULT};
pub use storage::{BitStore, BitsetStorage, RemoteStorage};
