//! Handle-based page cache.
//!
//! An LRU store of decoded pages, accessed through reference-counted
//! handles. While any handle to a page is live, the page's bytes are
//! never evicted or freed; eviction prefers normal pages over durable
//! ones. Memory attributed to the cache flows through its own
//! [`MemTracker`](crate::mem::MemTracker) regardless of which query
//! thread triggered the allocation or eviction.

mod lru;

pub use lru::{CachePriority, CacheStats};

use bytes::Bytes;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::mem::{MemTracker, TrackerScope};
use lru::{LruStore, PageEntry};

/// A scoped, reference-counted borrow of one cached page.
///
/// Holding a handle guarantees the page's bytes stay valid and the entry
/// is not evicted. Cloning a handle takes an additional reference;
/// dropping the last handle makes the entry eviction-eligible again.
#[derive(Debug, Clone)]
pub struct PageHandle {
    entry: Arc<PageEntry>,
}

impl PageHandle {
    /// The page bytes.
    pub fn data(&self) -> &[u8] {
        self.entry.data()
    }

    /// The eviction class the page was inserted with.
    pub fn priority(&self) -> CachePriority {
        self.entry.priority()
    }
}

impl Deref for PageHandle {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl AsRef<[u8]> for PageHandle {
    fn as_ref(&self) -> &[u8] {
        self.data()
    }
}

/// Memory-safe, priority-aware cache of decoded pages.
///
/// # Thread Safety
///
/// Lookups, inserts, and capacity changes are safe for concurrent use
/// from many threads. The global create/release pair is not: it must run
/// single-threaded, before the first and after the last concurrent user.
#[derive(Debug)]
pub struct PageCache {
    store: LruStore,
    mem_tracker: Arc<MemTracker>,
}

static GLOBAL: Mutex<Option<Arc<PageCache>>> = Mutex::new(None);

impl PageCache {
    /// Creates a cache with the given accounting context and capacity.
    pub fn new(mem_tracker: Arc<MemTracker>, capacity: usize) -> Self {
        Self { store: LruStore::new(capacity), mem_tracker }
    }

    /// Creates the process-wide cache. Called once by the bootstrap
    /// sequence before any concurrent use; a second call fails.
    pub fn create_global(mem_tracker: Arc<MemTracker>, capacity: usize) -> Result<()> {
        let mut global = GLOBAL.lock();
        if global.is_some() {
            return Err(Error::invalid_state("page cache already created"));
        }
        log::info!("creating global page cache, capacity: {} bytes", capacity);
        *global = Some(Arc::new(PageCache::new(mem_tracker, capacity)));
        Ok(())
    }

    /// The process-wide cache, if created.
    pub fn global() -> Option<Arc<PageCache>> {
        GLOBAL.lock().clone()
    }

    /// Tears the process-wide cache down. Called once at shutdown, after
    /// all users have stopped.
    pub fn release_global() {
        let released = GLOBAL.lock().take();
        if released.is_some() {
            log::info!("released global page cache");
        }
    }

    /// Looks `key` up, returning a handle on a hit.
    ///
    /// A hit refreshes the page's recency; a miss has no side effects
    /// and is not an error.
    pub fn lookup(&self, key: &[u8]) -> Option<PageHandle> {
        self.store.lookup(key).map(|entry| PageHandle { entry })
    }

    /// Inserts a page, taking ownership of `data`, and returns a handle
    /// already holding one reference.
    ///
    /// `in_memory` pages are tagged [`CachePriority::Durable`]; all
    /// others are [`CachePriority::Normal`]. Insertion evicts
    /// unreferenced entries to make room, never an entry with a live
    /// handle, so usage may transiently exceed capacity by the pinned
    /// bytes plus this page.
    pub fn insert(&self, key: &[u8], data: Vec<u8>, in_memory: bool) -> PageHandle {
        // Freed and allocated bytes belong to the cache, not to the
        // calling query thread.
        let _scope = TrackerScope::new(self.mem_tracker.clone());

        let priority = if in_memory { CachePriority::Durable } else { CachePriority::Normal };
        let entry = self.store.insert(Bytes::copy_from_slice(key), data, priority);
        PageHandle { entry }
    }

    /// Updates the capacity bound, synchronously evicting unreferenced
    /// entries until usage fits.
    pub fn set_capacity(&self, capacity: usize) {
        let _scope = TrackerScope::new(self.mem_tracker.clone());
        self.store.set_capacity(capacity);
    }

    /// The current capacity bound in bytes.
    pub fn get_capacity(&self) -> usize {
        self.store.get_capacity()
    }

    /// Bytes currently held by cached pages.
    pub fn memory_usage(&self) -> usize {
        self.store.usage()
    }

    /// The cache's accounting context.
    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }

    /// Get current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}
