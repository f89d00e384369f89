//! Configuration options for the caches.

use serde::{Deserialize, Serialize};

/// Configuration options for initializing a [`BlockCache`](crate::BlockCache)
/// and its underlying key-value engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Size of one cache block (in bytes). Every offset passed to a block
    /// cache operation must be a multiple of this value, fixed for the
    /// lifetime of the cache.
    /// Default: 1MB
    pub block_size: usize,

    /// Memory capacity of the underlying engine (in bytes).
    /// Set to 0 to disable caching.
    /// Default: 128MB
    pub mem_capacity: usize,

    /// Largest single object the engine will accept (in bytes).
    /// Objects above this size are silently not cached.
    /// Set to 0 for no limit beyond `mem_capacity`.
    /// Default: 0
    pub max_object_size: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            block_size: 1024 * 1024,            // 1MB
            mem_capacity: 128 * 1024 * 1024,    // 128MB
            max_object_size: 0,
        }
    }
}

impl CacheOptions {
    /// Creates a new CacheOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the engine memory capacity.
    pub fn mem_capacity(mut self, size: usize) -> Self {
        self.mem_capacity = size;
        self
    }

    /// Sets the largest cacheable object size.
    pub fn max_object_size(mut self, size: usize) -> Self {
        self.max_object_size = size;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> crate::Result<()> {
        if self.block_size == 0 {
            return Err(crate::Error::invalid_argument("block_size must be > 0"));
        }
        if self.max_object_size != 0 && self.max_object_size < self.block_size {
            return Err(crate::Error::invalid_argument(
                "max_object_size must be 0 or >= block_size",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = CacheOptions::default();
        assert_eq!(opts.block_size, 1024 * 1024);
        assert_eq!(opts.mem_capacity, 128 * 1024 * 1024);
        assert_eq!(opts.max_object_size, 0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let opts = CacheOptions::new()
            .block_size(4096)
            .mem_capacity(64 * 1024)
            .max_object_size(8192);

        assert_eq!(opts.block_size, 4096);
        assert_eq!(opts.mem_capacity, 64 * 1024);
        assert_eq!(opts.max_object_size, 8192);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_validation() {
        let mut opts = CacheOptions::default();
        assert!(opts.validate().is_ok());

        opts.block_size = 0;
        assert!(opts.validate().is_err());

        opts.block_size = 4096;
        opts.max_object_size = 1024;
        assert!(opts.validate().is_err());
    }
}
