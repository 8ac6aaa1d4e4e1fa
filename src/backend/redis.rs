//! Redis bit-array backend over an r2d2 connection pool.
//!
//! Each trait method acquires one pooled connection, runs its command(s),
//! and returns the connection to the pool on scope exit — including on
//! error. set_bits sends the whole batch as one pipeline, so a flush of n
//! queued bits costs one round-trip instead of n.
//!
//! Timeouts and reconnect policy live in the pool/client configuration,
//! not here.

use anyhow::{Context, Result};
use log::debug;
use r2d2::Pool;
use redis::Client;

use super::BitBackend;

/// Redis-backed bit arrays. Cloning shares the pool.
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool<Client>,
}

impl RedisBackend {
    /// Wrap an already-configured pool.
    pub fn new(pool: Pool<Client>) -> Self {
        Self { pool }
    }

    /// Convenience constructor: client + pool from a redis URL
    /// (e.g. "redis://127.0.0.1:6379/0").
    pub fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let client = Client::open(url).with_context(|| format!("redis client for {}", url))?;
        let pool = Pool::builder()
            .max_size(max_connections)
            .build(client)
            .context("build redis connection pool")?;
        Ok(Self { pool })
    }
}

impl BitBackend for RedisBackend {
    fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.pool.get().context("acquire redis connection")?;
        redis::cmd("EXISTS")
            .arg(key)
            .query(&mut *conn)
            .with_context(|| format!("EXISTS {}", key))
    }

    fn zero_init(&self, key: &str, nbits: u64) -> Result<()> {
        if nbits == 0 {
            return Ok(());
        }
        let mut conn = self.pool.get().context("acquire redis connection")?;
        // Redis zero-fills everything up to the highest offset written.
        redis::cmd("SETBIT")
            .arg(key)
            .arg(nbits - 1)
            .arg(0u8)
            .query::<()>(&mut *conn)
            .with_context(|| format!("zero-init {} ({} bits)", key, nbits))?;
        debug!("zero_init: key={} nbits={}", key, nbits);
        Ok(())
    }

    fn get_bit(&self, key: &str, index: u64) -> Result<bool> {
        let mut conn = self.pool.get().context("acquire redis connection")?;
        let bit: u8 = redis::cmd("GETBIT")
            .arg(key)
            .arg(index)
            .query(&mut *conn)
            .with_context(|| format!("GETBIT {} {}", key, index))?;
        Ok(bit == 1)
    }

    fn set_bits(&self, key: &str, indices: &[u64], value: bool) -> Result<()> {
        if indices.is_empty() {
            return Ok(());
        }
        let mut conn = self.pool.get().context("acquire redis connection")?;
        let bit = u8::from(value);
        let mut pipe = redis::pipe();
        for &index in indices {
            pipe.cmd("SETBIT").arg(key).arg(index).arg(bit).ignore();
        }
        pipe.query::<()>(&mut *conn)
            .with_context(|| format!("SETBIT batch of {} on {}", indices.len(), key))?;
        debug!("set_bits: key={} n={} value={}", key, indices.len(), bit);
        Ok(())
    }

    fn expire(&self, key: &str, seconds: u64) -> Result<()> {
        let mut conn = self.pool.get().context("acquire redis connection")?;
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(seconds)
            .query::<()>(&mut *conn)
            .with_context(|| format!("EXPIRE {} {}", key, seconds))
    }
}
