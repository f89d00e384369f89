//! The pluggable key-value cache engine consumed by the block cache.
//!
//! The block cache only ever stores fixed-size, uniformly-shaped entries,
//! so the engine contract is a flat byte-string keyed store with optional
//! TTL. An in-memory LRU implementation is provided; deployments may plug
//! in any store that satisfies [`CacheEngine`].

mod memory;

pub use memory::{EngineStats, MemoryEngine};

use bytes::Bytes;
use std::time::Duration;

use crate::Result;

/// A capacity-bounded key-value store with optional per-entry TTL.
///
/// # Thread Safety
///
/// Implementations must be safe for concurrent operations on distinct
/// keys from many threads. Concurrent operations on the same key have no
/// ordering guarantee beyond "last writer wins".
pub trait CacheEngine: Send + Sync {
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// `ttl` bounds the entry's lifetime; expiry is evaluated lazily on
    /// access, not by a background sweep. `None` means no expiry.
    fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()>;

    /// Copies the entry for `key` into `out` and returns the number of
    /// bytes copied, at most `out.len()`.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the key is
    /// absent or its TTL has elapsed.
    fn get(&self, key: &[u8], out: &mut [u8]) -> Result<usize>;

    /// Returns a shared view of the entry's bytes without copying.
    ///
    /// The view remains valid even if the entry is evicted afterwards;
    /// the underlying storage is kept alive until the last view is
    /// dropped.
    fn get_zero_copy(&self, key: &[u8]) -> Result<Bytes>;

    /// Removes the entry for `key`. Removing an absent key succeeds.
    fn remove(&self, key: &[u8]) -> Result<()>;

    /// Releases all engine resources. Called exactly once at teardown.
    fn shutdown(&self) -> Result<()>;
}
