//! Asynchronous deletion of snapshot files.
//!
//! Deleting a snapshot is two-phase: the core marks the descriptor
//! `Deleting` and hands the job here; the worker sweeps the snapshot's
//! segment entries, removes the descriptor, and reports the final status
//! through the caller's completion token. A job that never ran leaves the
//! `Deleting` marker behind for the next submission to pick up.

use common::{FileInfo, FsError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::storage::{NameServerStorage, StoreError};

/// Move-only completion token for an asynchronous snapshot delete. The
/// holder invokes it exactly once with the final status; the type system
/// rules out a second invocation.
pub struct SnapshotDeleteReply {
    tx: oneshot::Sender<common::Result<()>>,
}

impl SnapshotDeleteReply {
    pub fn channel() -> (Self, oneshot::Receiver<common::Result<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Deliver the final status, consuming the token. A receiver that went
    /// away (client disconnect) is ignored.
    pub fn complete(self, result: common::Result<()>) {
        let _ = self.tx.send(result);
    }
}

/// Accepts delete jobs for snapshots already marked `Deleting`.
pub trait SnapshotCleanManager: Send + Sync {
    /// Queue the job. Returns false when it cannot be accepted; the caller
    /// surfaces that as an internal error and leaves the marker in place.
    fn submit_delete_snapshot_file_job(
        &self,
        snapshot: FileInfo,
        reply: Option<SnapshotDeleteReply>,
    ) -> bool;
}

struct CleanTask {
    snapshot: FileInfo,
    reply: Option<SnapshotDeleteReply>,
}

/// Worker-backed clean manager: one background task drains the queue,
/// sweeping each snapshot's allocations before dropping its descriptor.
pub struct CleanTaskManager {
    tx: mpsc::UnboundedSender<CleanTask>,
}

impl CleanTaskManager {
    pub fn new(storage: Arc<dyn NameServerStorage>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<CleanTask>();
        tokio::spawn(async move {
            while let Some(task) = rx.recv().await {
                let snapshot = task.snapshot;
                tracing::info!(
                    "snapshot clean start, file = {}, seq = {}",
                    snapshot.full_path,
                    snapshot.seq_num
                );
                let result = Self::clean_snapshot(storage.as_ref(), &snapshot).await;
                match &result {
                    Ok(()) => tracing::info!(
                        "snapshot clean done, file = {}, seq = {}",
                        snapshot.full_path,
                        snapshot.seq_num
                    ),
                    Err(e) => tracing::warn!(
                        "snapshot clean failed, file = {}, seq = {}, status = {}",
                        snapshot.full_path,
                        snapshot.seq_num,
                        e
                    ),
                }
                if let Some(reply) = task.reply {
                    reply.complete(result);
                }
            }
        });
        Self { tx }
    }

    async fn clean_snapshot(
        storage: &dyn NameServerStorage,
        snapshot: &FileInfo,
    ) -> common::Result<()> {
        let segments = storage.list_segment(snapshot.id).await.map_err(|e| {
            tracing::warn!("list_segment failed, file = {}: {}", snapshot.full_path, e);
            FsError::StorageError
        })?;

        for segment in segments {
            match storage
                .delete_segment(snapshot.id, segment.start_offset)
                .await
            {
                // A concurrently vanished segment is already what we want.
                Ok(()) | Err(StoreError::KeyNotExist) => {}
                Err(StoreError::Internal(e)) => {
                    tracing::warn!(
                        "delete_segment failed, file = {}, offset = {}: {}",
                        snapshot.full_path,
                        segment.start_offset,
                        e
                    );
                    return Err(FsError::StorageError);
                }
            }
        }

        match storage
            .delete_file(snapshot.parent_id, &snapshot.filename)
            .await
        {
            Ok(()) | Err(StoreError::KeyNotExist) => Ok(()),
            Err(StoreError::Internal(e)) => {
                tracing::warn!(
                    "delete snapshot entry failed, file = {}: {}",
                    snapshot.full_path,
                    e
                );
                Err(FsError::StorageError)
            }
        }
    }
}

impl SnapshotCleanManager for CleanTaskManager {
    fn submit_delete_snapshot_file_job(
        &self,
        snapshot: FileInfo,
        reply: Option<SnapshotDeleteReply>,
    ) -> bool {
        self.tx.send(CleanTask { snapshot, reply }).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemNameServerStorage;
    use crate::storage::NameServerStorage;
    use common::{FileStatus, PageFileSegment};

    const GIB: u64 = 1 << 30;

    fn deleting_snapshot() -> FileInfo {
        let source = FileInfo::new_page_file(
            1,
            common::ROOT_INODE_ID,
            "vol".to_string(),
            "/vol".to_string(),
            10 * GIB,
            GIB,
            16 << 20,
        );
        let mut snapshot = source.snapshot_descriptor(2);
        snapshot.status = FileStatus::Deleting;
        snapshot
    }

    fn segment(file_id: u64, offset: u64) -> PageFileSegment {
        PageFileSegment {
            file_id,
            logical_pool_id: 1,
            segment_size: GIB,
            chunk_size: 16 << 20,
            start_offset: offset,
            chunks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_clean_sweeps_segments_and_descriptor() {
        let storage = Arc::new(MemNameServerStorage::new());
        let snapshot = deleting_snapshot();
        storage.create_file(&snapshot).await.unwrap();
        storage.put_segment(&segment(snapshot.id, 0)).await.unwrap();
        storage
            .put_segment(&segment(snapshot.id, GIB))
            .await
            .unwrap();

        let cleaner = CleanTaskManager::new(storage.clone());
        let (reply, rx) = SnapshotDeleteReply::channel();
        assert!(cleaner.submit_delete_snapshot_file_job(snapshot.clone(), Some(reply)));

        assert_eq!(rx.await.unwrap(), Ok(()));
        assert!(storage.list_segment(snapshot.id).await.unwrap().is_empty());
        assert!(matches!(
            storage.get_file(snapshot.parent_id, &snapshot.filename).await,
            Err(StoreError::KeyNotExist)
        ));
    }

    #[tokio::test]
    async fn test_clean_without_reply_token() {
        let storage = Arc::new(MemNameServerStorage::new());
        let snapshot = deleting_snapshot();
        storage.create_file(&snapshot).await.unwrap();

        let cleaner = CleanTaskManager::new(storage.clone());
        assert!(cleaner.submit_delete_snapshot_file_job(snapshot.clone(), None));

        // The worker has no completion to await; poll the store instead.
        for _ in 0..50 {
            if storage
                .get_file(snapshot.parent_id, &snapshot.filename)
                .await
                .is_err()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("snapshot entry was never cleaned");
    }
}
