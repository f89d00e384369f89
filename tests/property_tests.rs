// Property-based tests for the block splitting protocol

use datacache::{BlockCache, CacheOptions, Error, MemTracker, PageCache};
use proptest::prelude::*;

fn cache(block_size: usize) -> BlockCache {
    let options = CacheOptions::new().block_size(block_size).mem_capacity(8 << 20);
    BlockCache::new(options).unwrap()
}

proptest! {
    /// Aligned write-then-read returns exactly the written bytes for any
    /// block size, offset, and payload length
    #[test]
    fn round_trip_any_aligned_range(
        block_size in 1usize..512,
        offset_blocks in 0u64..16,
        data in proptest::collection::vec(any::<u8>(), 0..4096),
    ) {
        let cache = cache(block_size);
        let offset = offset_blocks * block_size as u64;

        cache.write("obj", offset, &data, None).unwrap();

        let mut out = vec![0u8; data.len()];
        let n = cache.read("obj", offset, &mut out).unwrap();
        prop_assert_eq!(n, data.len());
        prop_assert_eq!(out, data);
    }

    /// Misaligned offsets are rejected by every operation
    #[test]
    fn misaligned_offset_always_rejected(
        block_size in 2usize..512,
        offset in 1u64..100_000,
        len in 1usize..64,
    ) {
        prop_assume!(offset % block_size as u64 != 0);
        let cache = cache(block_size);

        prop_assert!(matches!(
            cache.write("k", offset, &vec![0u8; len], None),
            Err(Error::InvalidArgument(_))
        ));
        let mut out = vec![0u8; len];
        prop_assert!(matches!(cache.read("k", offset, &mut out), Err(Error::InvalidArgument(_))));
        prop_assert!(matches!(
            cache.read_zero_copy("k", offset, len as u64),
            Err(Error::InvalidArgument(_))
        ));
        prop_assert!(matches!(cache.remove("k", offset, len as u64), Err(Error::InvalidArgument(_))));
    }

    /// A zero-copy read of any single in-block range returns the block's
    /// bytes without copying through the caller's buffer
    #[test]
    fn zero_copy_single_block(
        block_size in 1usize..512,
        index in 0u64..8,
        len in 1usize..512,
    ) {
        prop_assume!(len <= block_size);
        let cache = cache(block_size);
        let offset = index * block_size as u64;

        let data: Vec<u8> = (0..block_size).map(|i| (i % 239) as u8).collect();
        cache.write("obj", offset, &data, None).unwrap();

        let view = cache.read_zero_copy("obj", offset, len as u64).unwrap();
        prop_assert_eq!(view.as_ref(), &data[..]);
    }

    /// Removing an aligned range makes every covered block unreadable
    #[test]
    fn remove_clears_whole_range(
        block_size in 1usize..256,
        blocks in 1u64..8,
    ) {
        let cache = cache(block_size);
        let size = blocks * block_size as u64;

        cache.write("obj", 0, &vec![1u8; size as usize], None).unwrap();
        cache.remove("obj", 0, size).unwrap();

        for index in 0..blocks {
            prop_assert!(cache
                .read_zero_copy("obj", index * block_size as u64, block_size as u64)
                .is_err());
        }
    }

    /// Pages survive arbitrary churn while their handle is held
    #[test]
    fn pinned_page_survives_churn(
        capacity in 64usize..512,
        churn in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..64), 1..32),
    ) {
        let cache = PageCache::new(MemTracker::new("churn"), capacity);
        let pinned = cache.insert(b"pinned", vec![0xEE; 32], false);

        for (i, data) in churn.into_iter().enumerate() {
            let key = format!("churn/{}", i);
            drop(cache.insert(key.as_bytes(), data, false));
        }

        prop_assert_eq!(pinned.data(), &[0xEE; 32][..]);
        prop_assert!(cache.lookup(b"pinned").is_some());
    }
}
