//! # DataCache - Caching Layer for Storage Engines
//!
//! DataCache provides the two read-path caches of a storage engine:
//!
//! - **BlockCache**: a process-wide, block-addressable data cache.
//!   Callers read and write arbitrary byte ranges; the cache splits them
//!   into fixed-size blocks stored in a pluggable key-value engine and
//!   reassembles the results, with a zero-copy path for single-block
//!   reads.
//! - **PageCache**: an LRU store of decoded pages accessed through
//!   reference-counted handles, with priority-aware eviction (normal
//!   pages are reclaimed before durable ones) and memory accounting
//!   attributed to the cache itself.
//!
//! Both caches are designed for concurrent invocation from many query
//! threads, minimizing copies and lock contention on the read path.
//!
//! ## Example Usage
//!
//! ```rust
//! use datacache::{BlockCache, CacheOptions, MemTracker, PageCache};
//!
//! # fn main() -> Result<(), datacache::Error> {
//! // Byte-range caching over fixed-size blocks.
//! let options = CacheOptions::new().block_size(4096).mem_capacity(1 << 20);
//! let cache = BlockCache::new(options)?;
//! cache.write("segment-1", 0, &[42u8; 8192], None)?;
//!
//! let mut buf = vec![0u8; 8192];
//! let n = cache.read("segment-1", 0, &mut buf)?;
//! assert_eq!(n, 8192);
//!
//! // Handle-based page caching.
//! let pages = PageCache::new(MemTracker::new("page_cache"), 1 << 20);
//! let handle = pages.insert(b"tablet/7/page/3", vec![1, 2, 3], false);
//! assert_eq!(handle.data(), &[1, 2, 3]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod block;
pub mod config;
pub mod engine;
pub mod error;
pub mod mem;
pub mod page;

// Re-exports
pub use block::BlockCache;
pub use config::CacheOptions;
pub use engine::{CacheEngine, MemoryEngine};
pub use error::{Error, Result};
pub use mem::MemTracker;
pub use page::{CachePriority, CacheStats, PageCache, PageHandle};
