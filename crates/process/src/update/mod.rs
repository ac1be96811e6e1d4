//! The file-update saga.
//!
//! Publishes the current local bytes of an already-synchronized file as a new
//! version:
//!
//! 1. fetch and decrypt the user profile
//! 2. resolve the target node and its meta file, check write access
//! 3. chunk, encrypt and put the new content
//! 4. append a version to the meta file, publish it under its new content
//!    address and repoint the tree node at it
//! 5. commit the updated profile (point of no return)
//! 6. tell other peers (advisory)
//!
//! Old versions stay retrievable: their chunks are never touched here, only
//! the superseded meta file block is swapped for the extended one.

mod version;

pub use version::PutNewVersionStep;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use common::crypto::{Secret, UserCredentials};
use common::dht::{DhtPort, Key};
use common::model::{ChunkRef, FileTreeNode, MetaFile, UserProfile};

use crate::engine::{Process, ProcessError, ProcessStep};
use crate::fs::FileManager;
use crate::notify::{PeerNotifier, TreeEvent, TreeEventKind};
use crate::steps::{
    ChunkContext, CommitUserProfileStep, GetUserProfileStep, NetworkContext, NotifyContext,
    NotifyPeersStep, ProfileContext, PutChunksStep, ResolveMetaFileStep, TreeContext, TreeTarget,
};

/// Saga-scoped state for one update.
pub struct UpdateContext {
    dht: Arc<dyn DhtPort>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
    secret: Secret,
    target: TreeTarget,
    content: Bytes,
    profile: Option<UserProfile>,
    profile_block: Option<Bytes>,
    node: Option<FileTreeNode>,
    meta: Option<MetaFile>,
    meta_block: Option<Bytes>,
    chunk_refs: Vec<ChunkRef>,
    new_meta_key: Option<Key>,
}

impl UpdateContext {
    /// Inject an already-known profile so the fetch step is skipped.
    pub fn set_user_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
    }

    /// The meta file key after the new version was published.
    pub fn new_meta_key(&self) -> Option<&Key> {
        self.new_meta_key.as_ref()
    }

    pub(crate) fn set_new_meta_key(&mut self, key: Key) {
        self.new_meta_key = Some(key);
    }

    /// The node being updated, once resolution has run.
    pub fn updated_node(&self) -> Option<&FileTreeNode> {
        self.node.as_ref()
    }
}

impl NetworkContext for UpdateContext {
    fn dht(&self) -> &Arc<dyn DhtPort> {
        &self.dht
    }
}

impl ProfileContext for UpdateContext {
    fn credentials(&self) -> &UserCredentials {
        &self.credentials
    }
    fn profile_secret(&self) -> &Secret {
        &self.secret
    }
    fn user_profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }
    fn user_profile_mut(&mut self) -> Option<&mut UserProfile> {
        self.profile.as_mut()
    }
    fn set_user_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
    }
    fn profile_block(&self) -> Option<&Bytes> {
        self.profile_block.as_ref()
    }
    fn set_profile_block(&mut self, block: Bytes) {
        self.profile_block = Some(block);
    }
}

impl TreeContext for UpdateContext {
    fn target(&self) -> &TreeTarget {
        &self.target
    }
    fn node(&self) -> Option<&FileTreeNode> {
        self.node.as_ref()
    }
    fn set_node(&mut self, node: FileTreeNode) {
        self.node = Some(node);
    }
    fn meta_file(&self) -> Option<&MetaFile> {
        self.meta.as_ref()
    }
    fn meta_block(&self) -> Option<&Bytes> {
        self.meta_block.as_ref()
    }
    fn set_meta_file(&mut self, meta: MetaFile, block: Bytes) {
        self.meta = Some(meta);
        self.meta_block = Some(block);
    }
}

impl ChunkContext for UpdateContext {
    fn content(&self) -> &Bytes {
        &self.content
    }
    fn chunk_refs(&self) -> &[ChunkRef] {
        &self.chunk_refs
    }
    fn push_chunk_ref(&mut self, chunk: ChunkRef) {
        self.chunk_refs.push(chunk);
    }
}

impl NotifyContext for UpdateContext {
    fn notifier(&self) -> &Arc<dyn PeerNotifier> {
        &self.notifier
    }
    fn tree_event(&self) -> Option<TreeEvent> {
        self.node.as_ref().map(|node| TreeEvent {
            user_id: self.credentials.user_id().to_string(),
            node_id: node.id(),
            kind: TreeEventKind::Updated,
        })
    }
}

fn chain() -> Box<dyn ProcessStep<UpdateContext>> {
    GetUserProfileStep::new(ResolveMetaFileStep::new(PutChunksStep::new(
        PutNewVersionStep::new(CommitUserProfileStep::new(NotifyPeersStep::new())),
    )))
}

/// Build an update saga for a local file that is already in the tree.
///
/// The file must exist and must not be a directory; its bytes are read here,
/// before any step runs. Violations fail construction with
/// [`ProcessError::InvalidArgument`]. Whether the path actually resolves to a
/// file node in the tree is only known once the profile is fetched, so that
/// check lives in the step chain.
pub async fn from_path(
    path: impl AsRef<Path>,
    files: Arc<dyn FileManager>,
    dht: Arc<dyn DhtPort>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
) -> Result<Process<UpdateContext>, ProcessError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    tracing::info!(path = %path.display(), "publishing new file version to the DHT");

    if !files.exists(&path).await {
        return Err(ProcessError::InvalidArgument(format!(
            "target does not exist: {}",
            path.display()
        )));
    }
    if files
        .is_dir(&path)
        .await
        .map_err(|e| ProcessError::InvalidArgument(e.to_string()))?
    {
        return Err(ProcessError::InvalidArgument(format!(
            "cannot update a folder: {}",
            path.display()
        )));
    }
    let content = files
        .read(&path)
        .await
        .map_err(|e| ProcessError::InvalidArgument(e.to_string()))?;

    let secret = credentials
        .derive_secret()
        .map_err(|e| ProcessError::InvalidArgument(format!("cannot derive profile key: {e}")))?;

    let context = UpdateContext {
        dht,
        notifier,
        credentials,
        secret,
        target: TreeTarget::Path(path),
        content,
        profile: None,
        profile_block: None,
        node: None,
        meta: None,
        meta_block: None,
        chunk_refs: Vec::new(),
        new_meta_key: None,
    };

    Ok(Process::new(context, chain()))
}
