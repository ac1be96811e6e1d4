//! One entry in a user's synchronized namespace tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dht::Key;

/// A single file or folder in the user's namespace.
///
/// Nodes are owned exclusively by the [`FileTree`](super::FileTree) inside a
/// user profile and never outlive it. The parent link is a back-reference,
/// not an ownership edge; ownership flows root-down through `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTreeNode {
    id: Uuid,
    name: String,
    parent: Option<Uuid>,
    /// Child ids. Only folders carry children; a folder must be empty before
    /// it can be detached from the tree.
    children: BTreeSet<Uuid>,
    /// Content address of the node's meta file. Files only; folders have no
    /// content in the DHT.
    meta: Option<Key>,
    is_folder: bool,
    /// User ids besides the profile owner that may mutate this node.
    writers: BTreeSet<String>,
}

impl FileTreeNode {
    /// Create a file node pointing at its meta file block.
    pub fn new_file(name: impl Into<String>, meta: Key) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: None,
            children: BTreeSet::new(),
            meta: Some(meta),
            is_folder: false,
            writers: BTreeSet::new(),
        }
    }

    /// Create an empty folder node.
    pub fn new_folder(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent: None,
            children: BTreeSet::new(),
            meta: None,
            is_folder: true,
            writers: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Uuid> {
        self.parent
    }

    pub(super) fn set_parent(&mut self, parent: Option<Uuid>) {
        self.parent = parent;
    }

    pub fn children(&self) -> &BTreeSet<Uuid> {
        &self.children
    }

    pub(super) fn children_mut(&mut self) -> &mut BTreeSet<Uuid> {
        &mut self.children
    }

    pub fn meta(&self) -> Option<&Key> {
        self.meta.as_ref()
    }

    /// Repoint the node at a new meta file block (new file version).
    pub fn set_meta(&mut self, meta: Key) {
        self.meta = Some(meta);
    }

    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    pub fn is_file(&self) -> bool {
        !self.is_folder
    }

    /// Grant write access to another user.
    pub fn add_writer(&mut self, user_id: impl Into<String>) {
        self.writers.insert(user_id.into());
    }

    pub fn writers(&self) -> &BTreeSet<String> {
        &self.writers
    }
}
