//! In-memory LRU/TTL cache engine.
//!
//! This is the default [`CacheEngine`]: a thread-safe, capacity-bounded
//! LRU store with lazy per-entry TTL expiry.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::CacheEngine;
use crate::config::CacheOptions;
use crate::error::{Error, Result};

/// Statistics for engine performance monitoring.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Total number of engine lookups (copying and zero-copy).
    pub lookups: u64,
    /// Number of lookups that found a live entry.
    pub hits: u64,
    /// Number of lookups that found nothing.
    pub misses: u64,
    /// Number of insertions.
    pub insertions: u64,
    /// Number of capacity-driven evictions.
    pub evictions: u64,
    /// Number of entries dropped on access because their TTL elapsed.
    pub expirations: u64,
}

impl EngineStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }
}

#[derive(Debug)]
struct Entry {
    data: Bytes,
    deadline: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }
}

/// Thread-safe in-memory LRU store with lazy TTL expiry.
///
/// Uses a HashMap for O(1) lookups and a VecDeque for maintaining LRU
/// order. Expiry is evaluated on access only; an expired entry occupies
/// capacity until it is read, removed, or evicted.
///
/// The capacity is a target rather than a hard ceiling: concurrent puts
/// may transiently push the stored bytes past it, and the next put evicts
/// the excess.
#[derive(Debug)]
pub struct MemoryEngine {
    /// Maximum capacity in bytes. Zero disables caching entirely.
    capacity: usize,
    /// Largest accepted object in bytes, 0 for no limit.
    max_object_size: usize,
    /// Current cached bytes.
    current_size: AtomicU64,
    /// Entries stored by key.
    entries: RwLock<HashMap<Bytes, Entry>>,
    /// LRU queue (most recently used at the back).
    lru_queue: RwLock<VecDeque<Bytes>>,
    /// Engine statistics.
    stats: RwLock<EngineStats>,
}

impl MemoryEngine {
    /// Creates a new engine sized from `options`.
    pub fn new(options: &CacheOptions) -> Self {
        Self {
            capacity: options.mem_capacity,
            max_object_size: options.max_object_size,
            current_size: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
            lru_queue: RwLock::new(VecDeque::new()),
            stats: RwLock::new(EngineStats::default()),
        }
    }

    /// Get current engine statistics.
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// Current cached bytes.
    pub fn size(&self) -> usize {
        self.current_size.load(Ordering::Relaxed) as usize
    }

    /// Number of entries, including any not-yet-collected expired ones.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the engine is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Touch a key to mark it as most recently used.
    ///
    /// O(n) over the queue; acceptable at the entry counts a block-sized
    /// store holds. See the recency queue note on the page cache store.
    fn touch(&self, key: &[u8]) {
        let mut lru_queue = self.lru_queue.write();
        if let Some(pos) = lru_queue.iter().position(|k| k.as_ref() == key) {
            let key = lru_queue.remove(pos);
            if let Some(key) = key {
                lru_queue.push_back(key);
            }
        }
    }

    /// Evict the least recently used entry.
    fn evict_one(&self) {
        let key = self.lru_queue.write().pop_front();
        if let Some(key) = key {
            let removed = self.entries.write().remove(&key);
            if let Some(entry) = removed {
                self.current_size.fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
                self.stats.write().evictions += 1;
            }
        }
    }

    /// Drop an entry found expired on access.
    fn drop_expired(&self, key: &[u8]) {
        let removed = self.entries.write().remove(key);
        if let Some(entry) = removed {
            self.current_size.fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
            self.lru_queue.write().retain(|k| k.as_ref() != key);
            self.stats.write().expirations += 1;
        }
    }

    /// Shared lookup path for the copying and zero-copy reads.
    fn lookup(&self, key: &[u8]) -> Result<Bytes> {
        self.stats.write().lookups += 1;

        let found = {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if entry.expired(Instant::now()) => None,
                Some(entry) => Some(entry.data.clone()),
                None => {
                    self.stats.write().misses += 1;
                    return Err(Error::not_found(format!(
                        "cache key {}",
                        String::from_utf8_lossy(key)
                    )));
                }
            }
        };

        match found {
            Some(data) => {
                self.touch(key);
                self.stats.write().hits += 1;
                Ok(data)
            }
            None => {
                // Present but past its deadline: reclaim lazily.
                self.drop_expired(key);
                self.stats.write().misses += 1;
                Err(Error::not_found(format!(
                    "cache key {} expired",
                    String::from_utf8_lossy(key)
                )))
            }
        }
    }
}

impl CacheEngine for MemoryEngine {
    fn put(&self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }
        // Objects too large to ever fit are not cached at all.
        if value.len() > self.capacity
            || (self.max_object_size != 0 && value.len() > self.max_object_size)
        {
            log::debug!(
                "skip caching oversized object, key: {}, size: {}",
                String::from_utf8_lossy(key),
                value.len()
            );
            return Ok(());
        }

        // Check-then-act: two concurrent puts can both pass this check and
        // transiently overshoot the capacity; the next put evicts the
        // excess. The capacity is a target, not a hard ceiling.
        while self.current_size.load(Ordering::Relaxed) as usize + value.len() > self.capacity {
            self.evict_one();
        }

        let key = Bytes::copy_from_slice(key);
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        let entry = Entry { data: Bytes::copy_from_slice(value), deadline };

        {
            let mut entries = self.entries.write();
            let mut lru_queue = self.lru_queue.write();

            if let Some(old) = entries.insert(key.clone(), entry) {
                self.current_size.fetch_sub(old.data.len() as u64, Ordering::Relaxed);
                lru_queue.retain(|k| k != &key);
            }
            lru_queue.push_back(key);
            // The size update must land while the locks are held: an entry
            // visible in the map but not yet accounted would let a
            // concurrent eviction drive the counter below zero.
            self.current_size.fetch_add(value.len() as u64, Ordering::Relaxed);
        }

        self.stats.write().insertions += 1;
        Ok(())
    }

    fn get(&self, key: &[u8], out: &mut [u8]) -> Result<usize> {
        let data = self.lookup(key)?;
        let n = data.len().min(out.len());
        out[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn get_zero_copy(&self, key: &[u8]) -> Result<Bytes> {
        self.lookup(key)
    }

    fn remove(&self, key: &[u8]) -> Result<()> {
        let removed = self.entries.write().remove(key);
        if let Some(entry) = removed {
            self.current_size.fetch_sub(entry.data.len() as u64, Ordering::Relaxed);
            self.lru_queue.write().retain(|k| k.as_ref() != key);
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        let mut entries = self.entries.write();
        let mut lru_queue = self.lru_queue.write();
        log::info!("shutting down memory engine, dropping {} entries", entries.len());
        entries.clear();
        lru_queue.clear();
        self.current_size.store(0, Ordering::Relaxed);
        Ok(())
    }
}
