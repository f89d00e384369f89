//! Block-addressable data cache.
//!
//! Callers address arbitrary byte ranges of a logical object; the
//! underlying engine only understands whole fixed-size blocks. This module
//! owns the splitting and reassembly protocol between the two: a range is
//! decomposed into block-aligned sub-requests, each issued against a
//! derived sub-key, and the results are stitched back into the caller's
//! buffer (or handed out as a zero-copy view).

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::CacheOptions;
use crate::engine::{CacheEngine, MemoryEngine};
use crate::error::{Error, Result};

/// The engine-facing key for one block of a logical object.
///
/// The `base/index` form gives every block of the same object a distinct,
/// deterministic namespace: base keys cannot collide with each other's
/// blocks as long as they are distinct themselves.
fn block_key(key: &str, index: u64) -> Vec<u8> {
    format!("{}/{}", key, index).into_bytes()
}

/// A byte-range-addressable cache over a block-addressable engine.
///
/// All offsets must be aligned to the cache's block size, fixed at
/// construction. The alignment tax buys the engine a uniform entry shape:
/// it only ever stores blocks of up to `block_size` bytes, which keeps its
/// internal allocation strategy simple.
///
/// # Thread Safety
///
/// `BlockCache` is safe for concurrent use from many threads. Operations
/// on the same base key over overlapping ranges have no cross-block
/// ordering guarantee: the last writer for a given block wins, and a
/// concurrent reader may observe any interleaving of per-block results.
///
/// # Partial application
///
/// Multi-block operations are not atomic. They fail fast: the first
/// failing sub-operation aborts the loop and its error is surfaced to the
/// caller verbatim, with earlier blocks already applied and later blocks
/// untouched. Callers needing atomicity must build it above this layer,
/// for example by writing a completion marker block last.
pub struct BlockCache {
    engine: Arc<dyn CacheEngine>,
    block_size: usize,
    shut_down: AtomicBool,
}

static INSTANCE: OnceLock<BlockCache> = OnceLock::new();

impl BlockCache {
    /// Creates a standalone cache backed by the in-memory engine.
    pub fn new(options: CacheOptions) -> Result<Self> {
        options.validate()?;
        let engine = Arc::new(MemoryEngine::new(&options));
        Ok(Self { engine, block_size: options.block_size, shut_down: AtomicBool::new(false) })
    }

    /// Creates a standalone cache backed by a caller-supplied engine.
    pub fn with_engine(options: CacheOptions, engine: Arc<dyn CacheEngine>) -> Result<Self> {
        options.validate()?;
        Ok(Self { engine, block_size: options.block_size, shut_down: AtomicBool::new(false) })
    }

    /// Initializes the process-wide cache instance. One-shot: a second
    /// call returns `InvalidState` and leaves the existing instance alone.
    pub fn init(options: CacheOptions) -> Result<&'static BlockCache> {
        let cache = BlockCache::new(options)?;
        if INSTANCE.set(cache).is_err() {
            return Err(Error::invalid_state("block cache already initialized"));
        }
        let instance = Self::instance()?;
        log::info!("block cache initialized, block size: {} bytes", instance.block_size);
        Ok(instance)
    }

    /// The process-wide cache instance, if [`init`](Self::init) has run.
    pub fn instance() -> Result<&'static BlockCache> {
        INSTANCE
            .get()
            .ok_or_else(|| Error::invalid_state("block cache is not initialized"))
    }

    /// The fixed block size in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Writes `buffer` at `offset` of the object named `key`.
    ///
    /// The range is split into per-block puts sharing one `ttl`, each
    /// carrying `min(remaining, block_size)` bytes drawn sequentially
    /// from `buffer`. An empty buffer is a successful no-op.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `offset` is not a multiple of the block size
    /// or the range end overflows `u64` (no engine call is made). Engine
    /// failures abort the loop with earlier blocks durably written; see
    /// the type-level notes on
    /// partial application.
    pub fn write(
        &self,
        key: &str,
        offset: u64,
        buffer: &[u8],
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.check_alignment(key, offset, "write")?;
        if buffer.is_empty() {
            return Ok(());
        }

        let (start_block, end_block) = self.block_range(offset, buffer.len() as u64)?;
        let mut off_in_buf = 0usize;
        for index in start_block..end_block {
            let len = (buffer.len() - off_in_buf).min(self.block_size);
            self.engine
                .put(&block_key(key, index), &buffer[off_in_buf..off_in_buf + len], ttl)?;
            off_in_buf += len;
        }
        Ok(())
    }

    /// Reads the range `[offset, offset + buffer.len())` of `key` into
    /// `buffer`, returning the total bytes the engine produced.
    ///
    /// Each block is copied into `buffer` at `block_offset * block_size`
    /// relative to the start of the range, so the destination cursor
    /// advances by a full block size per block regardless of how many
    /// bytes that block returned. The engine contract makes this sound:
    /// every interior block of an object stores exactly `block_size`
    /// bytes, only the final block may be short, and buffer space past a
    /// short final block is left untouched.
    ///
    /// An empty buffer returns `0` with no engine call.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` on a misaligned `offset` or a range end that
    /// overflows `u64`. On an engine failure
    /// the first error is surfaced; bytes already copied for earlier
    /// blocks remain in `buffer` as a partial result the caller must not
    /// assume is contiguous-valid beyond the failure point.
    pub fn read(&self, key: &str, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        self.check_alignment(key, offset, "read")?;
        if buffer.is_empty() {
            return Ok(0);
        }

        let (start_block, end_block) = self.block_range(offset, buffer.len() as u64)?;
        let mut off_in_buf = 0usize;
        let mut read_size = 0usize;
        for index in start_block..end_block {
            let chunk_end = (off_in_buf + self.block_size).min(buffer.len());
            let n = self
                .engine
                .get(&block_key(key, index), &mut buffer[off_in_buf..chunk_end])?;
            read_size += n;
            off_in_buf += self.block_size;
        }
        Ok(read_size)
    }

    /// Returns a zero-copy view of a single-block range of `key`.
    ///
    /// Resolves exactly one block, `offset / block_size`. A range that
    /// crosses a block boundary is rejected rather than silently
    /// truncated. `size == 0` returns an empty view with no engine call.
    ///
    /// The returned [`Bytes`] shares the engine's storage: no allocation,
    /// no copy, and the bytes stay valid even if the entry is evicted
    /// while the view is held.
    pub fn read_zero_copy(&self, key: &str, offset: u64, size: u64) -> Result<Bytes> {
        self.check_alignment(key, offset, "read")?;
        if size == 0 {
            return Ok(Bytes::new());
        }

        let (start_block, end_block) = self.block_range(offset, size)?;
        if end_block - start_block > 1 {
            log::warn!(
                "zero-copy read of block key: {} spans {} blocks, offset: {}, size: {}",
                key,
                end_block - start_block,
                offset,
                size
            );
            return Err(Error::invalid_argument(
                "zero-copy reads must not cross a block boundary",
            ));
        }
        self.engine.get_zero_copy(&block_key(key, start_block))
    }

    /// Removes the blocks covering `[offset, offset + size)` of `key`.
    ///
    /// Not atomic; the first engine error aborts with earlier blocks
    /// already removed. `size == 0` is a successful no-op.
    pub fn remove(&self, key: &str, offset: u64, size: u64) -> Result<()> {
        self.check_alignment(key, offset, "remove")?;
        if size == 0 {
            return Ok(());
        }

        let (start_block, end_block) = self.block_range(offset, size)?;
        for index in start_block..end_block {
            self.engine.remove(&block_key(key, index))?;
        }
        Ok(())
    }

    /// Shuts the engine down. Runs at most once; later calls are no-ops.
    ///
    /// Teardown is always explicit: dropping the cache does not shut the
    /// engine down.
    pub fn shutdown(&self) -> Result<()> {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::info!("shutting down block cache");
        self.engine.shutdown()
    }

    /// The half-open block index range covering `size` bytes at `offset`.
    /// Callers guarantee `size > 0` and an aligned offset.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `offset + size` exceeds `u64::MAX`.
    fn block_range(&self, offset: u64, size: u64) -> Result<(u64, u64)> {
        let end = offset.checked_add(size).ok_or_else(|| {
            Error::invalid_argument(format!(
                "range overflows, offset: {}, size: {}",
                offset, size
            ))
        })?;
        let block_size = self.block_size as u64;
        let start_block = offset / block_size;
        let end_block = (end - 1) / block_size + 1;
        Ok((start_block, end_block))
    }

    fn check_alignment(&self, key: &str, offset: u64, op: &str) -> Result<()> {
        if offset % self.block_size as u64 != 0 {
            log::warn!("{} block key: {} with invalid offset: {}", op, key, offset);
            return Err(Error::invalid_argument(format!(
                "offset must be aligned by block size {}",
                self.block_size
            )));
        }
        Ok(())
    }
}
