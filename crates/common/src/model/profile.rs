//! User profile and file tree.
//!
//! One profile per user, stored encrypted in the DHT at the user's logical
//! profile key. The profile is copy-on-write: a saga fetches it, applies its
//! delta to the in-memory tree, and commits the whole updated profile in one
//! put. Nothing in the DHT is ever mutated in place, so concurrent writers at
//! worst overwrite each other (last writer wins at this layer).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::block::BlockEncoded;

use super::node::FileTreeNode;

/// Structural errors raised by tree mutations
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("node not found in tree: {0}")]
    NodeNotFound(Uuid),
    #[error("node is not a folder: {0}")]
    NotAFolder(Uuid),
    #[error("folder is not empty: {0}")]
    FolderNotEmpty(Uuid),
    #[error("sibling with same name already exists: {0}")]
    DuplicateName(String),
    #[error("the root folder cannot be detached")]
    CannotDetachRoot,
}

/// The tree of [`FileTreeNode`]s making up one user's namespace.
///
/// Nodes live in a flat id-keyed map; parent/child edges are ids. The root is
/// an unnamed folder created with the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTree {
    root: Uuid,
    nodes: BTreeMap<Uuid, FileTreeNode>,
}

impl Default for FileTree {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTree {
    pub fn new() -> Self {
        let root = FileTreeNode::new_folder("");
        let root_id = root.id();
        let mut nodes = BTreeMap::new();
        nodes.insert(root_id, root);
        FileTree {
            root: root_id,
            nodes,
        }
    }

    pub fn root_id(&self) -> Uuid {
        self.root
    }

    pub fn node(&self, id: &Uuid) -> Option<&FileTreeNode> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &Uuid) -> Option<&mut FileTreeNode> {
        self.nodes.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Walk an absolute path down from the root, matching child names
    /// component by component.
    pub fn resolve(&self, path: &Path) -> Option<&FileTreeNode> {
        let mut current = self.nodes.get(&self.root)?;
        for component in path.iter() {
            let component = component.to_string_lossy();
            if component == "/" {
                continue;
            }
            let next = current
                .children()
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .find(|child| child.name() == component)?;
            current = next;
        }
        Some(current)
    }

    /// Attach `node` under the folder `parent`.
    ///
    /// The parent must exist and be a folder, and no sibling may share the
    /// node's name.
    pub fn attach(&mut self, parent: Uuid, mut node: FileTreeNode) -> Result<Uuid, ModelError> {
        let parent_node = self
            .nodes
            .get(&parent)
            .ok_or(ModelError::NodeNotFound(parent))?;
        if !parent_node.is_folder() {
            return Err(ModelError::NotAFolder(parent));
        }
        let duplicate = parent_node
            .children()
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .any(|child| child.name() == node.name());
        if duplicate {
            return Err(ModelError::DuplicateName(node.name().to_string()));
        }

        let id = node.id();
        node.set_parent(Some(parent));
        self.nodes.insert(id, node);
        self.nodes
            .get_mut(&parent)
            .expect("parent checked above")
            .children_mut()
            .insert(id);
        Ok(id)
    }

    /// Detach a node from the tree and return it.
    ///
    /// A folder must be empty before it can be detached; the invariant is
    /// checked here as well as at delete-saga construction.
    pub fn detach(&mut self, id: &Uuid) -> Result<FileTreeNode, ModelError> {
        if *id == self.root {
            return Err(ModelError::CannotDetachRoot);
        }
        let node = self.nodes.get(id).ok_or(ModelError::NodeNotFound(*id))?;
        if node.is_folder() && !node.children().is_empty() {
            return Err(ModelError::FolderNotEmpty(*id));
        }
        let parent = node.parent();
        let mut node = self
            .nodes
            .remove(id)
            .expect("presence checked above");
        if let Some(parent) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent) {
                parent_node.children_mut().remove(id);
            }
        }
        node.set_parent(None);
        Ok(node)
    }

    /// Absolute path of a node, root-down.
    pub fn path_of(&self, id: &Uuid) -> Option<PathBuf> {
        let mut components = Vec::new();
        let mut current = self.nodes.get(id)?;
        while let Some(parent) = current.parent() {
            components.push(current.name().to_string());
            current = self.nodes.get(&parent)?;
        }
        let mut path = PathBuf::from("/");
        for component in components.iter().rev() {
            path.push(component);
        }
        Some(path)
    }
}

/// The root object of one user's synchronized state.
///
/// Mutated only by a saga committing its final profile put; the version
/// counter increments on every commit so peers can order profile snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    user_id: String,
    version: u64,
    tree: FileTree,
}

impl BlockEncoded for UserProfile {}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        UserProfile {
            user_id: user_id.into(),
            version: 0,
            tree: FileTree::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Increment the version counter; called once per commit.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn tree(&self) -> &FileTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut FileTree {
        &mut self.tree
    }

    /// Whether `user_id` may mutate `node` within this profile.
    ///
    /// The profile owner may always write; other users only when listed as
    /// writers on the node.
    pub fn can_write(&self, node: &FileTreeNode, user_id: &str) -> bool {
        self.user_id == user_id || node.writers().contains(user_id)
    }
}
