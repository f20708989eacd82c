//! The namespace policy engine: file, segment, and snapshot lifecycle.
//!
//! Every operation is stateless end to end apart from the storage backend;
//! request handlers may run it concurrently without any lock in this
//! layer. Multi-key consistency is delegated to the storage contract's
//! atomic primitives, and the few races the backend cannot rule out are
//! resolved here (see `get_or_allocate_segment` and
//! `create_snapshot_file`).

use common::{
    path, FileInfo, FileStatus, FileType, FsError, NameServerOptions, PageFileSegment, Result,
    ROOT_INODE_ID,
};
use std::sync::Arc;

use crate::chunk_allocator::ChunkSegmentAllocator;
use crate::clean_manager::{SnapshotCleanManager, SnapshotDeleteReply};
use crate::id_generator::InodeIdGenerator;
use crate::resolver::PathResolver;
use crate::storage::{NameServerStorage, StoreError};

pub struct PageFs {
    storage: Arc<dyn NameServerStorage>,
    inode_ids: Arc<dyn InodeIdGenerator>,
    chunk_allocator: Arc<dyn ChunkSegmentAllocator>,
    clean_manager: Arc<dyn SnapshotCleanManager>,
    resolver: PathResolver,
    options: NameServerOptions,
}

impl PageFs {
    pub fn new(
        storage: Arc<dyn NameServerStorage>,
        inode_ids: Arc<dyn InodeIdGenerator>,
        chunk_allocator: Arc<dyn ChunkSegmentAllocator>,
        clean_manager: Arc<dyn SnapshotCleanManager>,
        options: NameServerOptions,
    ) -> Result<Self> {
        if let Err(e) = options.validate() {
            tracing::error!("invalid namespace options: {}", e);
            return Err(FsError::ParamError);
        }
        let root = FileInfo::new_directory(
            ROOT_INODE_ID,
            ROOT_INODE_ID,
            "/".to_string(),
            "/".to_string(),
        );
        let resolver = PathResolver::new(storage.clone(), root);
        Ok(Self {
            storage,
            inode_ids,
            chunk_allocator,
            clean_manager,
            resolver,
            options,
        })
    }

    /// The cached root descriptor; never read from storage.
    pub fn root_file_info(&self) -> &FileInfo {
        self.resolver.root()
    }

    pub async fn create_file(&self, path: &str, file_type: FileType, length: u64) -> Result<()> {
        match file_type {
            FileType::Directory => {
                if length != 0 {
                    return Err(FsError::ParamError);
                }
            }
            FileType::PageFile => {
                if length < self.options.min_file_length
                    || length % self.options.default_segment_size != 0
                {
                    return Err(FsError::ParamError);
                }
            }
            FileType::AppendFile | FileType::SnapshotPageFile => {
                return Err(FsError::NotSupported)
            }
        }

        if path::split_path(path)?.is_empty() {
            // The root entry always exists.
            return Err(FsError::FileExists);
        }
        let (parent, last) = self.resolver.lookup_parent(path).await?;

        match self.storage.get_file(parent.id, &last).await {
            Ok(_) => return Err(FsError::FileExists),
            Err(StoreError::KeyNotExist) => {}
            Err(StoreError::Internal(e)) => return Err(backend_err("create_file get", e)),
        }

        let id = self.inode_ids.gen_inode_id().await.ok_or_else(|| {
            tracing::warn!("inode id allocation failed, path = {}", path);
            FsError::StorageError
        })?;

        let info = match file_type {
            FileType::Directory => {
                FileInfo::new_directory(id, parent.id, last, path.to_string())
            }
            _ => FileInfo::new_page_file(
                id,
                parent.id,
                last,
                path.to_string(),
                length,
                self.options.default_segment_size,
                self.options.default_chunk_size,
            ),
        };

        match self.storage.create_file(&info).await {
            Ok(()) => Ok(()),
            Err(e) => Err(backend_err("create_file put", e.to_string())),
        }
    }

    pub async fn get_file_info(&self, path: &str) -> Result<FileInfo> {
        self.resolver.lookup(path).await
    }

    pub async fn delete_file(&self, path: &str) -> Result<()> {
        if path::split_path(path)?.is_empty() {
            return Err(FsError::ParamError);
        }
        let info = self.resolver.lookup(path).await?;
        match self
            .storage
            .delete_file(info.parent_id, &info.filename)
            .await
        {
            Ok(()) => Ok(()),
            Err(StoreError::KeyNotExist) => Err(FsError::FileNotExists),
            Err(StoreError::Internal(e)) => Err(backend_err("delete_file", e)),
        }
    }

    /// List a directory's children.
    pub async fn read_dir(&self, path: &str) -> Result<Vec<FileInfo>> {
        let dir = match self.resolver.lookup(path).await {
            Ok(info) => info,
            Err(FsError::FileNotExists) => return Err(FsError::DirNotExist),
            Err(e) => return Err(e),
        };
        if dir.file_type != FileType::Directory {
            return Err(FsError::NotDirectory);
        }
        match self.storage.list_file(dir.id).await {
            Ok(entries) => Ok(entries),
            Err(StoreError::KeyNotExist) => Err(FsError::DirNotExist),
            Err(StoreError::Internal(e)) => Err(backend_err("read_dir list", e)),
        }
    }

    pub async fn rename_file(&self, old_path: &str, new_path: &str) -> Result<()> {
        if old_path == new_path {
            return Err(FsError::FileExists);
        }
        if path::split_path(old_path)?.is_empty() || path::split_path(new_path)?.is_empty() {
            return Err(FsError::ParamError);
        }

        let old_info = self.resolver.lookup(old_path).await?;
        let (new_parent, new_name) = self.resolver.lookup_parent(new_path).await?;

        match self.storage.get_file(new_parent.id, &new_name).await {
            Ok(_) => return Err(FsError::FileExists),
            Err(StoreError::KeyNotExist) => {}
            Err(StoreError::Internal(e)) => return Err(backend_err("rename_file get", e)),
        }

        let mut new_info = old_info.clone();
        new_info.parent_id = new_parent.id;
        new_info.filename = new_name.clone();
        new_info.full_path = path::join_path(&new_parent.full_path, &new_name);

        match self.storage.rename_file(&old_info, &new_info).await {
            Ok(()) => Ok(()),
            Err(StoreError::KeyNotExist) => Err(FsError::FileNotExists),
            Err(StoreError::Internal(e)) => Err(backend_err("rename_file", e)),
        }
    }

    pub async fn extend_file(&self, path: &str, new_length: u64) -> Result<()> {
        let mut info = self.resolver.lookup(path).await?;
        if info.file_type != FileType::PageFile {
            return Err(FsError::NotSupported);
        }

        if new_length > info.length {
            if new_length % info.segment_size != 0 {
                return Err(FsError::ExtentUnitError);
            }
            info.length = new_length;
            match self.storage.put_file(&info).await {
                Ok(()) => Ok(()),
                Err(StoreError::KeyNotExist) => Err(FsError::FileNotExists),
                Err(StoreError::Internal(e)) => Err(backend_err("extend_file put", e)),
            }
        } else if new_length < info.length {
            Err(FsError::ShrinkBiggerFile)
        } else {
            Ok(())
        }
    }

    pub async fn get_or_allocate_segment(
        &self,
        path: &str,
        offset: u64,
        allocate_if_missing: bool,
    ) -> Result<PageFileSegment> {
        let file = self.resolver.lookup(path).await?;
        if file.file_type != FileType::PageFile {
            return Err(FsError::ParamError);
        }
        check_segment_range(&file, offset)?;

        match self.storage.get_segment(file.id, offset).await {
            Ok(segment) => return Ok(segment),
            Err(StoreError::KeyNotExist) => {}
            Err(StoreError::Internal(e)) => return Err(backend_err("get_segment", e)),
        }
        if !allocate_if_missing {
            return Err(FsError::SegmentNotAllocated);
        }

        let segment = self
            .chunk_allocator
            .allocate_chunk_segment(
                file.id,
                self.options.default_logical_pool_id,
                offset,
                file.segment_size,
                file.chunk_size,
            )
            .await
            .ok_or_else(|| {
                tracing::warn!(
                    "chunk allocation refused, file = {}, offset = {}",
                    file.full_path,
                    offset
                );
                FsError::SegmentAllocateError
            })?;

        match self.storage.put_segment(&segment).await {
            Ok(()) => Ok(segment),
            Err(e) => {
                // A concurrent allocator won the insert; its segment is the
                // truth and ours is abandoned.
                if let Ok(winner) = self.storage.get_segment(file.id, offset).await {
                    return Ok(winner);
                }
                Err(backend_err("put_segment", e.to_string()))
            }
        }
    }

    pub async fn delete_segment(&self, path: &str, offset: u64) -> Result<()> {
        let file = self.resolver.lookup(path).await?;
        if file.file_type != FileType::PageFile {
            return Err(FsError::ParamError);
        }
        check_segment_range(&file, offset)?;

        match self.storage.get_segment(file.id, offset).await {
            Ok(_) => {}
            Err(StoreError::KeyNotExist) => return Err(FsError::SegmentNotAllocated),
            Err(StoreError::Internal(e)) => return Err(backend_err("delete_segment get", e)),
        }
        match self.storage.delete_segment(file.id, offset).await {
            Ok(()) => Ok(()),
            Err(StoreError::KeyNotExist) => Err(FsError::SegmentNotAllocated),
            Err(StoreError::Internal(e)) => Err(backend_err("delete_segment", e)),
        }
    }

    /// Take a snapshot of a page file. At most one snapshot that is not
    /// being deleted may exist per file.
    pub async fn create_snapshot_file(&self, path: &str) -> Result<FileInfo> {
        for attempt in 0..2 {
            let source = self.resolver.lookup(path).await?;
            if source.file_type != FileType::PageFile {
                return Err(FsError::NotSupported);
            }

            let snapshots = match self.storage.list_file(source.id).await {
                Ok(entries) => entries,
                Err(StoreError::KeyNotExist) => Vec::new(),
                Err(StoreError::Internal(e)) => {
                    return Err(backend_err("create_snapshot list", e))
                }
            };
            if snapshots.iter().any(|s| s.status != FileStatus::Deleting) {
                return Err(FsError::FileUnderSnapshot);
            }

            let id = self.inode_ids.gen_inode_id().await.ok_or_else(|| {
                tracing::warn!("inode id allocation failed, path = {}", path);
                FsError::StorageError
            })?;
            let snapshot = source.snapshot_descriptor(id);
            let mut updated_source = source.clone();
            updated_source.seq_num += 1;

            match self
                .storage
                .snapshot_file(&source, &updated_source, &snapshot)
                .await
            {
                Ok(()) => return Ok(snapshot),
                Err(StoreError::KeyNotExist) => return Err(FsError::FileNotExists),
                Err(StoreError::Internal(e)) if attempt == 0 => {
                    // Most likely a lost race on the seq_num bump; read the
                    // fresh source and try once more.
                    tracing::warn!(
                        "snapshot_file conflicted, retrying, file = {}: {}",
                        path,
                        e
                    );
                }
                Err(StoreError::Internal(e)) => return Err(backend_err("snapshot_file", e)),
            }
        }
        Err(FsError::StorageError)
    }

    pub async fn list_snapshot_file(&self, path: &str) -> Result<Vec<FileInfo>> {
        let source = self.resolver.lookup(path).await?;
        if source.file_type != FileType::PageFile {
            return Err(FsError::NotSupported);
        }
        match self.storage.list_file(source.id).await {
            Ok(entries) => Ok(entries),
            Err(StoreError::KeyNotExist) => Ok(Vec::new()),
            Err(StoreError::Internal(e)) => Err(backend_err("list_snapshot", e)),
        }
    }

    /// The filtered form preserves the order of the requested sequence
    /// numbers; absent seqs are silently skipped.
    pub async fn list_snapshot_file_by_seq(
        &self,
        path: &str,
        seqs: &[u64],
    ) -> Result<Vec<FileInfo>> {
        let all = self.list_snapshot_file(path).await?;
        Ok(seqs
            .iter()
            .filter_map(|seq| all.iter().find(|s| s.seq_num == *seq).cloned())
            .collect())
    }

    pub async fn get_snapshot_file_info(&self, path: &str, seq: u64) -> Result<FileInfo> {
        let snapshots = self.list_snapshot_file(path).await?;
        snapshots
            .into_iter()
            .find(|s| s.seq_num == seq)
            .ok_or(FsError::SnapshotFileNotExists)
    }

    pub async fn get_snapshot_file_segment(
        &self,
        path: &str,
        seq: u64,
        offset: u64,
    ) -> Result<PageFileSegment> {
        let snapshot = self.get_snapshot_file_info(path, seq).await?;
        check_segment_range(&snapshot, offset)?;
        match self.storage.get_segment(snapshot.id, offset).await {
            Ok(segment) => Ok(segment),
            Err(StoreError::KeyNotExist) => Err(FsError::SegmentNotAllocated),
            Err(StoreError::Internal(e)) => Err(backend_err("snapshot get_segment", e)),
        }
    }

    /// Mark a snapshot `Deleting` and hand it to the clean manager. The
    /// final status reaches the caller through `reply` once the cleaner is
    /// done; this method returns as soon as the job is submitted.
    pub async fn delete_file_snapshot_file(
        &self,
        path: &str,
        seq: u64,
        reply: Option<SnapshotDeleteReply>,
    ) -> Result<()> {
        let mut snapshot = self.get_snapshot_file_info(path, seq).await?;
        if snapshot.status == FileStatus::Deleting {
            return Err(FsError::SnapshotDeleting);
        }
        if snapshot.file_type != FileType::SnapshotPageFile {
            tracing::error!(
                "snapshot entry has wrong kind, file = {}, seq = {}, kind = {:?}",
                path,
                seq,
                snapshot.file_type
            );
            return Err(FsError::InternalError);
        }

        snapshot.status = FileStatus::Deleting;
        if let Err(e) = self.storage.put_file(&snapshot).await {
            tracing::error!(
                "failed to mark snapshot deleting, file = {}, seq = {}: {}",
                path,
                seq,
                e
            );
            return Err(FsError::InternalError);
        }

        if !self
            .clean_manager
            .submit_delete_snapshot_file_job(snapshot, reply)
        {
            // The Deleting marker stays in place; the cleaner owns recovery
            // on restart.
            tracing::error!(
                "snapshot clean job submission failed, file = {}, seq = {}",
                path,
                seq
            );
            return Err(FsError::InternalError);
        }
        Ok(())
    }

    /// Reserved for snapshot progress polling.
    pub async fn check_snapshot_status(&self, _path: &str, _seq: u64) -> Result<()> {
        Err(FsError::NotSupported)
    }
}

fn check_segment_range(file: &FileInfo, offset: u64) -> Result<()> {
    if file.segment_size == 0 || offset % file.segment_size != 0 {
        return Err(FsError::ParamError);
    }
    if offset + file.segment_size > file.length {
        return Err(FsError::ParamError);
    }
    Ok(())
}

fn backend_err(op: &str, detail: String) -> FsError {
    tracing::warn!("{} storage error: {}", op, detail);
    FsError::StorageError
}
