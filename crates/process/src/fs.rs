//! Local filesystem collaborator.
//!
//! Sagas touch the disk through this port only: the delete saga removes local
//! bytes before the DHT-side chain runs, and its compensation restores them
//! from the cached copy. Keeping it a trait lets tests run against an
//! in-memory tree.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("path not found: {0}")]
    NotFound(PathBuf),
}

/// Async view of the local file tree.
#[async_trait]
pub trait FileManager: Send + Sync {
    async fn exists(&self, path: &Path) -> bool;

    async fn is_dir(&self, path: &Path) -> Result<bool, FsError>;

    /// Whether a directory has any entries. Errors on files.
    async fn dir_is_empty(&self, path: &Path) -> Result<bool, FsError>;

    async fn read(&self, path: &Path) -> Result<Bytes, FsError>;

    /// Remove a file or an (empty) directory.
    async fn remove(&self, path: &Path) -> Result<(), FsError>;

    /// Put back what `remove` took away: file contents, or `None` to
    /// recreate a directory.
    async fn restore(&self, path: &Path, contents: Option<Bytes>) -> Result<(), FsError>;
}

/// The real thing, over `tokio::fs`.
#[derive(Debug, Default, Clone)]
pub struct LocalFileManager;

impl LocalFileManager {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileManager for LocalFileManager {
    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> Result<bool, FsError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| FsError::NotFound(path.to_path_buf()))?;
        Ok(metadata.is_dir())
    }

    async fn dir_is_empty(&self, path: &Path) -> Result<bool, FsError> {
        let mut entries = tokio::fs::read_dir(path).await?;
        Ok(entries.next_entry().await?.is_none())
    }

    async fn read(&self, path: &Path) -> Result<Bytes, FsError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Bytes::from(bytes))
    }

    async fn remove(&self, path: &Path) -> Result<(), FsError> {
        if self.is_dir(path).await? {
            tokio::fs::remove_dir(path).await?;
        } else {
            tokio::fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn restore(&self, path: &Path, contents: Option<Bytes>) -> Result<(), FsError> {
        match contents {
            Some(bytes) => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(path, bytes).await?;
            }
            None => tokio::fs::create_dir_all(path).await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let files = LocalFileManager::new();

        files
            .restore(&path, Some(Bytes::from_static(b"contents")))
            .await
            .unwrap();
        assert!(files.exists(&path).await);
        assert!(!files.is_dir(&path).await.unwrap());
        assert_eq!(files.read(&path).await.unwrap(), "contents");

        files.remove(&path).await.unwrap();
        assert!(!files.exists(&path).await);
    }

    #[tokio::test]
    async fn test_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("docs");
        let files = LocalFileManager::new();

        files.restore(&sub, None).await.unwrap();
        assert!(files.dir_is_empty(&sub).await.unwrap());

        files
            .restore(&sub.join("a.txt"), Some(Bytes::from_static(b"x")))
            .await
            .unwrap();
        assert!(!files.dir_is_empty(&sub).await.unwrap());
    }
}
