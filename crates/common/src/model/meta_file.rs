//! Meta files: the indirection between tree nodes and chunk content.
//!
//! The tree references a file's meta file by key; the meta file references
//! content by chunk keys. Large binary content therefore never lands inside
//! the profile object, and identical chunks can be shared across versions.
//!
//! Chunks carry no reference counts. A remove issued for a chunk key is
//! final whether or not another meta file still references it; callers must
//! make sure no live version needs a chunk before deleting it.

use serde::{Deserialize, Serialize};

use crate::block::BlockEncoded;
use crate::dht::Key;

/// A reference to one immutable, content-addressed chunk in the DHT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRef {
    key: Key,
    size: u64,
}

impl ChunkRef {
    pub fn new(key: Key, size: u64) -> Self {
        Self { key, size }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

/// One version of a file's bytes, as an ordered chunk list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVersion {
    index: u64,
    chunks: Vec<ChunkRef>,
}

impl FileVersion {
    pub fn new(index: u64, chunks: Vec<ChunkRef>) -> Self {
        Self { index, chunks }
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn chunks(&self) -> &[ChunkRef] {
        &self.chunks
    }

    /// Total byte size of this version.
    pub fn size(&self) -> u64 {
        self.chunks.iter().map(|c| c.size()).sum()
    }
}

/// Per-file metadata: the ordered version history of one file.
///
/// Stored in the DHT as its own encrypted block, content-addressed; adding a
/// version produces a new block under a new key and the tree node is
/// repointed at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaFile {
    versions: Vec<FileVersion>,
}

impl BlockEncoded for MetaFile {}

impl MetaFile {
    /// Create a meta file with a single initial version.
    pub fn initial(chunks: Vec<ChunkRef>) -> Self {
        MetaFile {
            versions: vec![FileVersion::new(0, chunks)],
        }
    }

    pub fn versions(&self) -> &[FileVersion] {
        &self.versions
    }

    pub fn latest(&self) -> Option<&FileVersion> {
        self.versions.last()
    }

    /// Append a new version holding `chunks`.
    pub fn push_version(&mut self, chunks: Vec<ChunkRef>) -> &FileVersion {
        let index = self.versions.last().map(|v| v.index() + 1).unwrap_or(0);
        self.versions.push(FileVersion::new(index, chunks));
        self.versions.last().expect("just pushed")
    }

    /// Every chunk referenced by any version, in version order.
    pub fn all_chunks(&self) -> impl Iterator<Item = &ChunkRef> {
        self.versions.iter().flat_map(|v| v.chunks().iter())
    }
}
