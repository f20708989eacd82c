//! Chunk placement seam.

use async_trait::async_trait;
use common::{ChunkInfo, InodeId, PageFileSegment};
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces fully populated segment descriptors. Placement policy lives
/// behind this trait; the core never inspects the chunk layout it gets
/// back.
#[async_trait]
pub trait ChunkSegmentAllocator: Send + Sync {
    /// Fill in a segment for `(file_id, offset)`, or `None` when no
    /// placement can be found.
    async fn allocate_chunk_segment(
        &self,
        file_id: InodeId,
        logical_pool_hint: u32,
        offset: u64,
        segment_size: u64,
        chunk_size: u64,
    ) -> Option<PageFileSegment>;
}

/// Placement stub for tests and single-node runs: sequential chunk ids
/// spread round-robin over a fixed copyset count.
pub struct RoundRobinChunkAllocator {
    next_chunk_id: AtomicU64,
    copyset_count: u32,
}

impl RoundRobinChunkAllocator {
    pub fn new(copyset_count: u32) -> Self {
        Self {
            next_chunk_id: AtomicU64::new(1),
            copyset_count: copyset_count.max(1),
        }
    }
}

#[async_trait]
impl ChunkSegmentAllocator for RoundRobinChunkAllocator {
    async fn allocate_chunk_segment(
        &self,
        file_id: InodeId,
        logical_pool_hint: u32,
        offset: u64,
        segment_size: u64,
        chunk_size: u64,
    ) -> Option<PageFileSegment> {
        if chunk_size == 0 || segment_size % chunk_size != 0 {
            return None;
        }
        let chunk_count = segment_size / chunk_size;
        let base = self.next_chunk_id.fetch_add(chunk_count, Ordering::Relaxed);
        let chunks = (0..chunk_count)
            .map(|i| ChunkInfo {
                chunk_id: base + i,
                copyset_id: ((base + i) % self.copyset_count as u64) as u32,
            })
            .collect();
        Some(PageFileSegment {
            file_id,
            logical_pool_id: logical_pool_hint,
            segment_size,
            chunk_size,
            start_offset: offset,
            chunks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GIB: u64 = 1 << 30;
    const MIB: u64 = 1 << 20;

    #[tokio::test]
    async fn test_allocates_one_chunk_per_slot() {
        let allocator = RoundRobinChunkAllocator::new(3);
        let segment = allocator
            .allocate_chunk_segment(7, 1, 2 * GIB, GIB, 16 * MIB)
            .await
            .unwrap();
        assert_eq!(segment.file_id, 7);
        assert_eq!(segment.logical_pool_id, 1);
        assert_eq!(segment.start_offset, 2 * GIB);
        assert_eq!(segment.chunks.len(), (GIB / (16 * MIB)) as usize);
    }

    #[tokio::test]
    async fn test_chunk_ids_do_not_repeat_across_segments() {
        let allocator = RoundRobinChunkAllocator::new(3);
        let first = allocator
            .allocate_chunk_segment(7, 1, 0, GIB, 16 * MIB)
            .await
            .unwrap();
        let second = allocator
            .allocate_chunk_segment(7, 1, GIB, GIB, 16 * MIB)
            .await
            .unwrap();
        let last_of_first = first.chunks.last().unwrap().chunk_id;
        let first_of_second = second.chunks.first().unwrap().chunk_id;
        assert!(first_of_second > last_of_first);
    }

    #[tokio::test]
    async fn test_refuses_misaligned_request() {
        let allocator = RoundRobinChunkAllocator::new(3);
        assert!(allocator
            .allocate_chunk_segment(7, 1, 0, GIB, GIB - 1)
            .await
            .is_none());
    }
}
