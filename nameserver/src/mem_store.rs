//! In-memory storage backend for tests and single-process development.
//!
//! A single ordered map stands in for the real key-value cluster; the
//! write lock makes the two multi-key operations genuinely atomic, and the
//! insert-if-absent operations are the reference behavior for the
//! compare-and-set contract of [`NameServerStorage`].

use async_trait::async_trait;
use common::{FileInfo, InodeId, PageFileSegment};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::codec;
use crate::storage::{NameServerStorage, StoreError, StoreResult};

pub struct MemNameServerStorage {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemNameServerStorage {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
        }
    }

    fn scan(tree: &BTreeMap<Vec<u8>, Vec<u8>>, prefix: &[u8]) -> Vec<Vec<u8>> {
        tree.range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, value)| value.clone())
            .collect()
    }
}

impl Default for MemNameServerStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NameServerStorage for MemNameServerStorage {
    async fn get_file(&self, parent_id: InodeId, filename: &str) -> StoreResult<FileInfo> {
        let data = self.data.read().await;
        match data.get(&codec::file_key(parent_id, filename)) {
            Some(bytes) => codec::decode_file(bytes),
            None => Err(StoreError::KeyNotExist),
        }
    }

    async fn create_file(&self, file: &FileInfo) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let key = codec::file_key(file.parent_id, &file.filename);
        if data.contains_key(&key) {
            return Err(StoreError::Internal(format!(
                "file entry already exists: {}",
                file.full_path
            )));
        }
        data.insert(key, codec::encode_file(file));
        Ok(())
    }

    async fn put_file(&self, file: &FileInfo) -> StoreResult<()> {
        let mut data = self.data.write().await;
        data.insert(
            codec::file_key(file.parent_id, &file.filename),
            codec::encode_file(file),
        );
        Ok(())
    }

    async fn delete_file(&self, parent_id: InodeId, filename: &str) -> StoreResult<()> {
        let mut data = self.data.write().await;
        match data.remove(&codec::file_key(parent_id, filename)) {
            Some(_) => Ok(()),
            None => Err(StoreError::KeyNotExist),
        }
    }

    async fn list_file(&self, parent_id: InodeId) -> StoreResult<Vec<FileInfo>> {
        let data = self.data.read().await;
        Self::scan(&data, &codec::file_prefix(parent_id))
            .iter()
            .map(|bytes| codec::decode_file(bytes))
            .collect()
    }

    async fn get_segment(&self, file_id: InodeId, offset: u64) -> StoreResult<PageFileSegment> {
        let data = self.data.read().await;
        match data.get(&codec::segment_key(file_id, offset)) {
            Some(bytes) => codec::decode_segment(bytes),
            None => Err(StoreError::KeyNotExist),
        }
    }

    async fn put_segment(&self, segment: &PageFileSegment) -> StoreResult<()> {
        let mut data = self.data.write().await;
        let key = codec::segment_key(segment.file_id, segment.start_offset);
        if data.contains_key(&key) {
            return Err(StoreError::Internal(format!(
                "segment already exists: file_id = {}, offset = {}",
                segment.file_id, segment.start_offset
            )));
        }
        data.insert(key, codec::encode_segment(segment));
        Ok(())
    }

    async fn delete_segment(&self, file_id: InodeId, offset: u64) -> StoreResult<()> {
        let mut data = self.data.write().await;
        match data.remove(&codec::segment_key(file_id, offset)) {
            Some(_) => Ok(()),
            None => Err(StoreError::KeyNotExist),
        }
    }

    async fn list_segment(&self, file_id: InodeId) -> StoreResult<Vec<PageFileSegment>> {
        let data = self.data.read().await;
        Self::scan(&data, &codec::segment_prefix(file_id))
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
        let mut data = self.data.write().await;

        let source_key = codec::file_key(source.parent_id, &source.filename);
        match data.get(&source_key) {
            Some(stored) if *stored == codec::encode_file(source) => {}
            Some(_) => {
                return Err(StoreError::Internal(format!(
                    "source descriptor changed under snapshot: {}",
                    source.full_path
                )))
            }
            None => return Err(StoreError::KeyNotExist),
        }

        let snapshot_key = codec::file_key(snapshot.parent_id, &snapshot.filename);
        if data.contains_key(&snapshot_key) {
            return Err(StoreError::Internal(format!(
                "snapshot entry already exists: {}",
                snapshot.full_path
            )));
        }

        data.insert(source_key, codec::encode_file(updated_source));
        data.insert(snapshot_key, codec::encode_file(snapshot));
        Ok(())
    }

    async fn rename_file(&self, old: &FileInfo, new: &FileInfo) -> StoreResult<()> {
        let mut data = self.data.write().await;

        let old_key = codec::file_key(old.parent_id, &old.filename);
        let new_key = codec::file_key(new.parent_id, &new.filename);
        if !data.contains_key(&old_key) {
            return Err(StoreError::KeyNotExist);
        }
        if data.contains_key(&new_key) {
            return Err(StoreError::Internal(format!(
                "rename destination already exists: {}",
                new.full_path
            )));
        }

        data.remove(&old_key);
        data.insert(new_key, codec::encode_file(new));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ROOT_INODE_ID;

    fn page_file(id: InodeId, parent: InodeId, name: &str, path: &str) -> FileInfo {
        FileInfo::new_page_file(
            id,
            parent,
            name.to_string(),
            path.to_string(),
            10 << 30,
            1 << 30,
            16 << 20,
        )
    }

    fn segment(file_id: InodeId, offset: u64) -> PageFileSegment {
        PageFileSegment {
            file_id,
            logical_pool_id: 1,
            segment_size: 1 << 30,
            chunk_size: 16 << 20,
            start_offset: offset,
            chunks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_create_file_rejects_duplicate() {
        let store = MemNameServerStorage::new();
        let file = page_file(1, ROOT_INODE_ID, "a", "/a");
        store.create_file(&file).await.unwrap();
        assert!(matches!(
            store.create_file(&file).await,
            Err(StoreError::Internal(_))
        ));
        // Upsert still goes through.
        store.put_file(&file).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_file_in_key_order() {
        let store = MemNameServerStorage::new();
        for (id, name) in [(1, "banana"), (2, "apple"), (3, "cherry")] {
            store
                .create_file(&page_file(id, ROOT_INODE_ID, name, &format!("/{}", name)))
                .await
                .unwrap();
        }
        // A child of another parent must not leak into the listing.
        store
            .create_file(&page_file(4, 1, "nested", "/banana/nested"))
            .await
            .unwrap();

        let names: Vec<String> = store
            .list_file(ROOT_INODE_ID)
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.filename)
            .collect();
        assert_eq!(names, vec!["apple", "banana", "cherry"]);
    }

    #[tokio::test]
    async fn test_put_segment_rejects_duplicate() {
        let store = MemNameServerStorage::new();
        store.put_segment(&segment(7, 0)).await.unwrap();
        assert!(matches!(
            store.put_segment(&segment(7, 0)).await,
            Err(StoreError::Internal(_))
        ));
        store.put_segment(&segment(7, 1 << 30)).await.unwrap();

        let offsets: Vec<u64> = store
            .list_segment(7)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.start_offset)
            .collect();
        assert_eq!(offsets, vec![0, 1 << 30]);
    }

    #[tokio::test]
    async fn test_snapshot_file_detects_changed_source() {
        let store = MemNameServerStorage::new();
        let source = page_file(1, ROOT_INODE_ID, "a", "/a");
        store.create_file(&source).await.unwrap();

        let mut updated = source.clone();
        updated.seq_num = 2;
        let snapshot = source.snapshot_descriptor(9);

        // Another writer bumps the source first.
        let mut interloper = source.clone();
        interloper.seq_num = 5;
        store.put_file(&interloper).await.unwrap();

        assert!(matches!(
            store.snapshot_file(&source, &updated, &snapshot).await,
            Err(StoreError::Internal(_))
        ));
        assert!(matches!(
            store.get_file(source.id, &snapshot.filename).await,
            Err(StoreError::KeyNotExist)
        ));

        // Against the current source, the pair write lands.
        let mut bumped = interloper.clone();
        bumped.seq_num = 6;
        let snapshot = interloper.snapshot_descriptor(9);
        store
            .snapshot_file(&interloper, &bumped, &snapshot)
            .await
            .unwrap();
        assert_eq!(
            store.get_file(ROOT_INODE_ID, "a").await.unwrap().seq_num,
            6
        );
        assert_eq!(
            store
                .get_file(source.id, &snapshot.filename)
                .await
                .unwrap()
                .seq_num,
            5
        );
    }

    #[tokio::test]
    async fn test_rename_file_moves_exactly_one_entry() {
        let store = MemNameServerStorage::new();
        let old = page_file(1, ROOT_INODE_ID, "a", "/a");
        store.create_file(&old).await.unwrap();

        let mut new = old.clone();
        new.filename = "b".to_string();
        new.full_path = "/b".to_string();

        store.rename_file(&old, &new).await.unwrap();
        assert!(matches!(
            store.get_file(ROOT_INODE_ID, "a").await,
            Err(StoreError::KeyNotExist)
        ));
        assert_eq!(store.get_file(ROOT_INODE_ID, "b").await.unwrap().id, 1);

        // Old entry is gone now.
        assert!(matches!(
            store.rename_file(&old, &new).await,
            Err(StoreError::KeyNotExist)
        ));

        // Occupied destination refuses the move.
        let other = page_file(2, ROOT_INODE_ID, "c", "/c");
        store.create_file(&other).await.unwrap();
        let mut onto_b = other.clone();
        onto_b.filename = "b".to_string();
        onto_b.full_path = "/b".to_string();
        assert!(matches!(
            store.rename_file(&other, &onto_b).await,
            Err(StoreError::Internal(_))
        ));
        assert_eq!(store.get_file(ROOT_INODE_ID, "c").await.unwrap().id, 2);
    }
}
