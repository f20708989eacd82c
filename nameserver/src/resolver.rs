//! Path resolution over the directory table.
//!
//! Entries are keyed `(parent_id, name)`, so resolving a path is a walk:
//! starting from the root descriptor, load each component under the
//! current directory's id and descend. Resolution costs one storage lookup
//! per component and caches nothing; the backend is expected to cache.

use common::{path, FileInfo, FileType, FsError, Result};
use std::sync::Arc;

use crate::storage::{NameServerStorage, StoreError};

pub struct PathResolver {
    storage: Arc<dyn NameServerStorage>,
    root: FileInfo,
}

impl PathResolver {
    pub fn new(storage: Arc<dyn NameServerStorage>, root: FileInfo) -> Self {
        Self { storage, root }
    }

    pub fn root(&self) -> &FileInfo {
        &self.root
    }

    /// Resolve the containing directory of `path`, returning it together
    /// with the last path component. The root has no parent and is
    /// rejected.
    pub async fn lookup_parent(&self, path: &str) -> Result<(FileInfo, String)> {
        let components = path::split_path(path)?;
        let (last, dirs) = components.split_last().ok_or(FsError::ParamError)?;
        let parent = self.walk(dirs).await?;
        Ok((parent, last.to_string()))
    }

    /// Resolve `path` to its descriptor. Root resolves to the cached root
    /// descriptor without touching storage.
    pub async fn lookup(&self, path: &str) -> Result<FileInfo> {
        let components = path::split_path(path)?;
        let Some((last, dirs)) = components.split_last() else {
            return Ok(self.root.clone());
        };
        let parent = self.walk(dirs).await?;
        self.load_entry(&parent, last).await
    }

    async fn walk(&self, components: &[&str]) -> Result<FileInfo> {
        let mut current = self.root.clone();
        for name in components {
            let entry = self.load_entry(&current, name).await?;
            if entry.file_type != FileType::Directory {
                return Err(FsError::NotDirectory);
            }
            current = entry;
        }
        Ok(current)
    }

    async fn load_entry(&self, parent: &FileInfo, name: &str) -> Result<FileInfo> {
        match self.storage.get_file(parent.id, name).await {
            Ok(entry) => Ok(entry),
            Err(StoreError::KeyNotExist) => Err(FsError::FileNotExists),
            Err(StoreError::Internal(e)) => {
                tracing::warn!(
                    "get_file failed, parent = {}, name = {}: {}",
                    parent.id,
                    name,
                    e
                );
                Err(FsError::StorageError)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem_store::MemNameServerStorage;
    use common::ROOT_INODE_ID;

    fn root() -> FileInfo {
        FileInfo::new_directory(
            ROOT_INODE_ID,
            ROOT_INODE_ID,
            "/".to_string(),
            "/".to_string(),
        )
    }

    async fn resolver_with_tree() -> PathResolver {
        let storage = Arc::new(MemNameServerStorage::new());
        let dir = FileInfo::new_directory(1, ROOT_INODE_ID, "dir".to_string(), "/dir".to_string());
        let file = FileInfo::new_page_file(
            2,
            1,
            "vol".to_string(),
            "/dir/vol".to_string(),
            10 << 30,
            1 << 30,
            16 << 20,
        );
        storage.create_file(&dir).await.unwrap();
        storage.create_file(&file).await.unwrap();
        PathResolver::new(storage, root())
    }

    #[tokio::test]
    async fn test_lookup_root() {
        let resolver = resolver_with_tree().await;
        assert_eq!(resolver.lookup("/").await.unwrap().id, ROOT_INODE_ID);
        assert_eq!(resolver.lookup("").await.unwrap().id, ROOT_INODE_ID);
    }

    #[tokio::test]
    async fn test_lookup_walks_directories() {
        let resolver = resolver_with_tree().await;
        let file = resolver.lookup("/dir/vol").await.unwrap();
        assert_eq!(file.id, 2);
        assert_eq!(file.full_path, "/dir/vol");
    }

    #[tokio::test]
    async fn test_lookup_parent_yields_dir_and_last_component() {
        let resolver = resolver_with_tree().await;
        let (parent, last) = resolver.lookup_parent("/dir/vol").await.unwrap();
        assert_eq!(parent.id, 1);
        assert_eq!(last, "vol");

        let (parent, last) = resolver.lookup_parent("/dir").await.unwrap();
        assert_eq!(parent.id, ROOT_INODE_ID);
        assert_eq!(last, "dir");

        assert_eq!(
            resolver.lookup_parent("/").await,
            Err(FsError::ParamError)
        );
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let resolver = resolver_with_tree().await;
        assert_eq!(
            resolver.lookup("/missing/vol").await,
            Err(FsError::FileNotExists)
        );
        // An intermediate that is not a directory stops the walk.
        assert_eq!(
            resolver.lookup("/dir/vol/deeper").await,
            Err(FsError::NotDirectory)
        );
        assert_eq!(
            resolver.lookup("/dir/vol/").await,
            Err(FsError::ParamError)
        );
    }
}
