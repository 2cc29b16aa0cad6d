use std::num::NonZeroUsize;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use lru::LruCache;
use tokio::sync::Mutex;

use super::RangeReader;
use crate::error::IoError;

/// Default block size: 64KB
///
/// Large enough to cover a whole classic IFD plus its nearby tag values in
/// one read, small enough that the label strips are not pulled in by accident.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

/// Default cache capacity in number of blocks (4MB with the default block size).
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Block-based caching layer that wraps any RangeReader.
///
/// Container parsing issues many small reads at scattered offsets: entry
/// counts, entry tables, next-IFD pointers, description strings. The cache
/// turns these into a few block-aligned reads of the underlying file.
///
/// - Fixed-size blocks (default 64KB)
/// - LRU eviction when the cache reaches capacity
/// - Reads spanning multiple blocks are stitched together
///
/// The cache is read-only: it must be dropped before the file it wraps is
/// modified.
pub struct BlockCache<R> {
    /// The underlying reader
    inner: R,
    /// Block size in bytes
    block_size: usize,
    /// Cached blocks indexed by block number
    cache: Mutex<LruCache<u64, Bytes>>,
}

impl<R: RangeReader> BlockCache<R> {
    /// Create a new BlockCache wrapping the given reader.
    ///
    /// Uses default block size (64KB) and cache capacity (64 blocks).
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_CAPACITY)
    }

    /// Create a new BlockCache with custom block size and capacity.
    ///
    /// # Arguments
    /// * `inner` - The underlying reader to wrap
    /// * `block_size` - Size of each cached block in bytes (minimum 1)
    /// * `capacity` - Maximum number of blocks to cache (minimum 1)
    pub fn with_capacity(inner: R, block_size: usize, capacity: usize) -> Self {
        Self {
            inner,
            block_size: block_size.max(1),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// Get a block from cache or fetch it from the underlying reader.
    async fn get_block(&self, block_idx: u64) -> Result<Bytes, IoError> {
        let mut cache = self.cache.lock().await;
        if let Some(data) = cache.get(&block_idx) {
            return Ok(data.clone());
        }

        let data = self.fetch_block_from_source(block_idx).await?;
        cache.put(block_idx, data.clone());
        Ok(data)
    }

    /// Fetch a block directly from the underlying reader.
    async fn fetch_block_from_source(&self, block_idx: u64) -> Result<Bytes, IoError> {
        let offset = block_idx * self.block_size as u64;
        let size = self.inner.size();

        // The last block may be shorter than block_size
        let remaining = size.saturating_sub(offset);
        if remaining == 0 {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: self.block_size as u64,
                size,
            });
        }

        let len = std::cmp::min(self.block_size as u64, remaining) as usize;
        self.inner.read_exact_at(offset, len).await
    }

    #[inline]
    fn block_for_offset(&self, offset: u64) -> u64 {
        offset / self.block_size as u64
    }

    #[inline]
    fn offset_within_block(&self, offset: u64) -> usize {
        (offset % self.block_size as u64) as usize
    }
}

#[async_trait]
impl<R: RangeReader> RangeReader for BlockCache<R> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let size = self.inner.size();
        let end = offset.checked_add(len as u64);
        if end.map_or(true, |end| end > size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let start_block = self.block_for_offset(offset);
        let end_block = self.block_for_offset(offset + len as u64 - 1);

        if start_block == end_block {
            let block = self.get_block(start_block).await?;
            let block_offset = self.offset_within_block(offset);
            return Ok(block.slice(block_offset..block_offset + len));
        }

        let mut result = BytesMut::with_capacity(len);
        let mut remaining = len;
        let mut current_offset = offset;

        for block_idx in start_block..=end_block {
            let block = self.get_block(block_idx).await?;
            let block_offset = self.offset_within_block(current_offset);
            let bytes_in_block = std::cmp::min(block.len() - block_offset, remaining);

            result.extend_from_slice(&block[block_offset..block_offset + bytes_in_block]);

            remaining -= bytes_in_block;
            current_offset += bytes_in_block as u64;
        }

        Ok(result.freeze())
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn identifier(&self) -> &str {
        self.inner.identifier()
    }
}
