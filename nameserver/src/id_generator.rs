//! Inode identifier source.

use async_trait::async_trait;
use common::{InodeId, ROOT_INODE_ID};
use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out unique 64-bit inode identifiers. The production source is an
/// external allocator; the core only sees this seam.
#[async_trait]
pub trait InodeIdGenerator: Send + Sync {
    /// The next unique inode id, or `None` when the id source is
    /// unavailable.
    async fn gen_inode_id(&self) -> Option<InodeId>;
}

/// Process-local sequential id source for tests and single-node runs.
pub struct SequentialInodeIdGenerator {
    next: AtomicU64,
}

impl SequentialInodeIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(ROOT_INODE_ID + 1)
    }

    pub fn starting_at(first: InodeId) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for SequentialInodeIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InodeIdGenerator for SequentialInodeIdGenerator {
    async fn gen_inode_id(&self) -> Option<InodeId> {
        Some(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ids_are_unique_and_skip_root() {
        let ids = SequentialInodeIdGenerator::new();
        let first = ids.gen_inode_id().await.unwrap();
        let second = ids.gen_inode_id().await.unwrap();
        assert_ne!(first, ROOT_INODE_ID);
        assert_eq!(second, first + 1);
    }
}
