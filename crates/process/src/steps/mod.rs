//! Steps shared across saga kinds.
//!
//! Sagas differ in their contexts, so shared steps are written against small
//! capability traits instead of one concrete context. A context implements
//! exactly the capabilities the steps of its chain need; fields are
//! write-once per forward pass and read back during rollback.

mod commit_profile;
mod get_profile;
mod notify;
mod put_chunks;
mod resolve_meta;

pub use commit_profile::CommitUserProfileStep;
pub use get_profile::GetUserProfileStep;
pub use notify::NotifyPeersStep;
pub use put_chunks::{PutChunksStep, CHUNK_SIZE};
pub use resolve_meta::ResolveMetaFileStep;

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use common::crypto::{Secret, UserCredentials};
use common::dht::DhtPort;
use common::model::{ChunkRef, FileTreeNode, MetaFile, UserProfile};

use crate::notify::{PeerNotifier, TreeEvent};

/// What a saga is aimed at: a namespace path (interactive trigger) or a tree
/// node id (change inferred from a remote profile).
#[derive(Debug, Clone)]
pub enum TreeTarget {
    Path(PathBuf),
    Node(Uuid),
}

impl std::fmt::Display for TreeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeTarget::Path(path) => write!(f, "{}", path.display()),
            TreeTarget::Node(id) => write!(f, "node {}", id),
        }
    }
}

/// A context that can reach the DHT.
pub trait NetworkContext: Send + Sync {
    fn dht(&self) -> &Arc<dyn DhtPort>;
}

/// A context operating on a user profile.
pub trait ProfileContext: NetworkContext {
    fn credentials(&self) -> &UserCredentials;
    /// The credential-derived encryption key, fixed at saga construction.
    fn profile_secret(&self) -> &Secret;
    fn user_profile(&self) -> Option<&UserProfile>;
    fn user_profile_mut(&mut self) -> Option<&mut UserProfile>;
    fn set_user_profile(&mut self, profile: UserProfile);
    /// Raw profile ciphertext as fetched, kept for commit compensation.
    fn profile_block(&self) -> Option<&Bytes>;
    fn set_profile_block(&mut self, block: Bytes);
}

/// A context resolving a target node (and its meta file) in the tree.
pub trait TreeContext: ProfileContext {
    fn target(&self) -> &TreeTarget;
    fn node(&self) -> Option<&FileTreeNode>;
    fn set_node(&mut self, node: FileTreeNode);
    fn meta_file(&self) -> Option<&MetaFile>;
    /// Raw meta file ciphertext as fetched, kept for delete compensation.
    fn meta_block(&self) -> Option<&Bytes>;
    fn set_meta_file(&mut self, meta: MetaFile, block: Bytes);
}

/// A context uploading new chunk content.
pub trait ChunkContext: ProfileContext {
    /// The plaintext bytes to be chunked and uploaded.
    fn content(&self) -> &Bytes;
    fn chunk_refs(&self) -> &[ChunkRef];
    fn push_chunk_ref(&mut self, chunk: ChunkRef);
}

/// A context that can tell other peers what happened.
pub trait NotifyContext: Send + Sync {
    fn notifier(&self) -> &Arc<dyn PeerNotifier>;
    /// The event to broadcast, if the saga got far enough to know it.
    fn tree_event(&self) -> Option<TreeEvent>;
}
