//! Shared fixtures for the saga integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use process::fs::{FileManager, FsError};

/// Install a fmt subscriber once per test binary; `RUST_LOG` filters.
pub fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// In-memory stand-in for the local disk.
///
/// Entries are explicit: a path maps to `Some(bytes)` for a file and `None`
/// for a directory. Nothing springs into existence implicitly.
#[derive(Clone, Default)]
pub struct MemoryFileManager {
    entries: Arc<Mutex<BTreeMap<PathBuf, Option<Bytes>>>>,
}

impl MemoryFileManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_file(&self, path: impl AsRef<Path>, contents: &[u8]) {
        self.entries.lock().insert(
            path.as_ref().to_path_buf(),
            Some(Bytes::copy_from_slice(contents)),
        );
    }

    pub fn seed_dir(&self, path: impl AsRef<Path>) {
        self.entries.lock().insert(path.as_ref().to_path_buf(), None);
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        self.entries
            .lock()
            .get(path.as_ref())
            .and_then(|entry| entry.clone())
    }
}

#[async_trait]
impl FileManager for MemoryFileManager {
    async fn exists(&self, path: &Path) -> bool {
        self.entries.lock().contains_key(path)
    }

    async fn is_dir(&self, path: &Path) -> Result<bool, FsError> {
        match self.entries.lock().get(path) {
            Some(entry) => Ok(entry.is_none()),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    async fn dir_is_empty(&self, path: &Path) -> Result<bool, FsError> {
        let entries = self.entries.lock();
        match entries.get(path) {
            Some(None) => Ok(!entries
                .keys()
                .any(|candidate| candidate.parent() == Some(path))),
            Some(Some(_)) | None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    async fn read(&self, path: &Path) -> Result<Bytes, FsError> {
        match self.entries.lock().get(path) {
            Some(Some(bytes)) => Ok(bytes.clone()),
            _ => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    async fn remove(&self, path: &Path) -> Result<(), FsError> {
        match self.entries.lock().remove(path) {
            Some(_) => Ok(()),
            None => Err(FsError::NotFound(path.to_path_buf())),
        }
    }

    async fn restore(&self, path: &Path, contents: Option<Bytes>) -> Result<(), FsError> {
        self.entries.lock().insert(path.to_path_buf(), contents);
        Ok(())
    }
}
