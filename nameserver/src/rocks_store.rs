//! RocksDB-backed storage for single-node deployments.
//!
//! Multi-key atomicity comes from `WriteBatch`; the insert-if-absent
//! operations are read-check-write and rely on the embedded engine's
//! single-process write path.

use async_trait::async_trait;
use common::{FileInfo, InodeId, PageFileSegment};
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;

use crate::codec;
use crate::storage::{NameServerStorage, StoreError, StoreResult};

#[derive(Clone)]
pub struct RocksNameServerStorage {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksNameServerStorage {
    /// Open or create the RocksDB instance located at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DBWithThreadMode::<MultiThreaded>::open(&opts, path).map_err(map_rocks_err)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn get_raw(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.db.get(key).map_err(map_rocks_err)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for kv in iter {
            let (raw_key, raw_val) = kv.map_err(map_rocks_err)?;
            if !raw_key.starts_with(prefix) {
                break;
            }
            values.push(raw_val.to_vec());
        }
        Ok(values)
    }
}

#[async_trait]
impl NameServerStorage for RocksNameServerStorage {
    async fn get_file(&self, parent_id: InodeId, filename: &str) -> StoreResult<FileInfo> {
        match self.get_raw(&codec::file_key(parent_id, filename))? {
            Some(bytes) => codec::decode_file(&bytes),
            None => Err(StoreError::KeyNotExist),
        }
    }

    async fn create_file(&self, file: &FileInfo) -> StoreResult<()> {
        let key = codec::file_key(file.parent_id, &file.filename);
        if self.get_raw(&key)?.is_some() {
            return Err(StoreError::Internal(format!(
                "file entry already exists: {}",
                file.full_path
            )));
        }
        self.db
            .put(key, codec::encode_file(file))
            .map_err(map_rocks_err)
    }

    async fn put_file(&self, file: &FileInfo) -> StoreResult<()> {
        self.db
            .put(
                codec::file_key(file.parent_id, &file.filename),
                codec::encode_file(file),
            )
            .map_err(map_rocks_err)
    }

    async fn delete_file(&self, parent_id: InodeId, filename: &str) -> StoreResult<()> {
        let key = codec::file_key(parent_id, filename);
        if self.get_raw(&key)?.is_none() {
            return Err(StoreError::KeyNotExist);
        }
        self.db.delete(key).map_err(map_rocks_err)
    }

    async fn list_file(&self, parent_id: InodeId) -> StoreResult<Vec<FileInfo>> {
        self.scan_prefix(&codec::file_prefix(parent_id))?
            .iter()
            .map(|bytes| codec::decode_file(bytes))
            .collect()
    }

    async fn get_segment(&self, file_id: InodeId, offset: u64) -> StoreResult<PageFileSegment> {
        match self.get_raw(&codec::segment_key(file_id, offset))? {
            Some(bytes) => codec::decode_segment(&bytes),
            None => Err(StoreError::KeyNotExist),
        }
    }

    async fn put_segment(&self, segment: &PageFileSegment) -> StoreResult<()> {
        let key = codec::segment_key(segment.file_id, segment.start_offset);
        if self.get_raw(&key)?.is_some() {
            return Err(StoreError::Internal(format!(
                "segment already exists: file_id = {}, offset = {}",
                segment.file_id, segment.start_offset
            )));
        }
        self.db
            .put(key, codec::encode_segment(segment))
            .map_err(map_rocks_err)
    }

    async fn delete_segment(&self, file_id: InodeId, offset: u64) -> StoreResult<()> {
        let key = codec::segment_key(file_id, offset);
        if self.get_raw(&key)?.is_none() {
            return Err(StoreError::KeyNotExist);
        }
        self.db.delete(key).map_err(map_rocks_err)
    }

    async fn list_segment(&self, file_id: InodeId) -> StoreResult<Vec<PageFileSegment>> {
        self.scan_prefix(&codec::segment_prefix(file_id))?
            .iter()
            .map(|bytes| codec::decode_segment(bytes))
            .collect()
    }

    async fn snapshot_file(
        &self,
        source: &FileInfo,
        updated_source: &FileInfo,
        snapshot: &FileInfo,
    ) -> StoreResult<()> {
        let source_key = codec::file_key(source.parent_id, &source.filename);
        match self.get_raw(&source_key)? {
            Some(stored) if stored == codec::encode_file(source) => {}
            Some(_) => {
                return Err(StoreError::Internal(format!(
                    "source descriptor changed under snapshot: {}",
                    source.full_path
                )))
            }
            None => return Err(StoreError::KeyNotExist),
        }

        let snapshot_key = codec::file_key(snapshot.parent_id, &snapshot.filename);
        if self.get_raw(&snapshot_key)?.is_some() {
            return Err(StoreError::Internal(format!(
                "snapshot entry already exists: {}",
                snapshot.full_path
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put(source_key, codec::encode_file(updated_source));
        batch.put(snapshot_key, codec::encode_file(snapshot));
        self.db.write(batch).map_err(map_rocks_err)
    }

    async fn rename_file(&self, old: &FileInfo, new: &FileInfo) -> StoreResult<()> {
        let old_key = codec::file_key(old.parent_id, &old.filename);
        let new_key = codec::file_key(new.parent_id, &new.filename);
        if self.get_raw(&old_key)?.is_none() {
            return Err(StoreError::KeyNotExist);
        }
        if self.get_raw(&new_key)?.is_some() {
            return Err(StoreError::Internal(format!(
                "rename destination already exists: {}",
                new.full_path
            )));
        }

        let mut batch = WriteBatch::default();
        batch.delete(old_key);
        batch.put(new_key, codec::encode_file(new));
        self.db.write(batch).map_err(map_rocks_err)
    }
}

fn map_rocks_err(err: rocksdb::Error) -> StoreError {
    StoreError::Internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ROOT_INODE_ID;

    #[tokio::test]
    async fn test_rocks_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksNameServerStorage::open(dir.path()).unwrap();

        let file = FileInfo::new_page_file(
            1,
            ROOT_INODE_ID,
            "vol".to_string(),
            "/vol".to_string(),
            10 << 30,
            1 << 30,
            16 << 20,
        );
        store.create_file(&file).await.unwrap();
        assert!(matches!(
            store.create_file(&file).await,
            Err(StoreError::Internal(_))
        ));
        assert_eq!(store.get_file(ROOT_INODE_ID, "vol").await.unwrap(), file);

        let names: Vec<String> = store
            .list_file(ROOT_INODE_ID)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.filename)
            .collect();
        assert_eq!(names, vec!["vol"]);

        store.delete_file(ROOT_INODE_ID, "vol").await.unwrap();
        assert!(matches!(
            store.delete_file(ROOT_INODE_ID, "vol").await,
            Err(StoreError::KeyNotExist)
        ));
    }
}
