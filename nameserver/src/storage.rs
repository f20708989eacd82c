//! Persistence contract between the namespace core and the key-value
//! backend.

use async_trait::async_trait;
use common::{FileInfo, InodeId, PageFileSegment};
use thiserror::Error;

/// The whole error surface of the storage layer. Absence of a key and
/// backend failure must stay distinguishable at every call site.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("key not exist")]
    KeyNotExist,

    #[error("internal storage error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Typed tables over a single ordered key-value namespace.
///
/// File entries are keyed `(parent_id, filename)`; snapshots are ordinary
/// file entries whose parent is the source page file. Segment entries are
/// keyed `(file_id, start_offset)`.
///
/// Per-key operations must be linearizable. `snapshot_file` and
/// `rename_file` must be atomic across the two keys they touch; there are
/// no ordering guarantees across unrelated keys.
#[async_trait]
pub trait NameServerStorage: Send + Sync {
    async fn get_file(&self, parent_id: InodeId, filename: &str) -> StoreResult<FileInfo>;

    /// Insert a new file entry. An already-present key fails with
    /// `Internal`; concurrent creators race here and exactly one wins.
    async fn create_file(&self, file: &FileInfo) -> StoreResult<()>;

    /// Upsert an existing file entry.
    async fn put_file(&self, file: &FileInfo) -> StoreResult<()>;

    async fn delete_file(&self, parent_id: InodeId, filename: &str) -> StoreResult<()>;

    /// All children of a directory, in key order.
    async fn list_file(&self, parent_id: InodeId) -> StoreResult<Vec<FileInfo>>;

    async fn get_segment(&self, file_id: InodeId, offset: u64) -> StoreResult<PageFileSegment>;

    /// Insert a new segment entry. Segments are immutable once written, so
    /// an already-present key fails with `Internal` and the stored segment
    /// wins the allocation race.
    async fn put_segment(&self, segment: &PageFileSegment) -> StoreResult<()>;

    async fn delete_segment(&self, file_id: InodeId, offset: u64) -> StoreResult<()>;

    /// All allocated segments of a file, in offset order.
    async fn list_segment(&self, file_id: InodeId) -> StoreResult<Vec<PageFileSegment>>;

    /// Atomically write the snapshot entry and the source entry with its
    /// bumped sequence number. Fails all-or-nothing; when the stored source
    /// no longer matches `source`, fails with `Internal` and writes
    /// nothing.
    async fn snapshot_file(
        &self,
        source: &FileInfo,
        updated_source: &FileInfo,
        snapshot: &FileInfo,
    ) -> StoreResult<()>;

    /// Atomically move a file entry from `old`'s key to `new`'s key.
    /// `KeyNotExist` when the old entry is gone; `Internal` when the
    /// destination key is already taken.
    async fn rename_file(&self, old: &FileInfo, new: &FileInfo) -> StoreResult<()>;
}
