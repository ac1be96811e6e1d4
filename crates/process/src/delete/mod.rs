//! The file-deletion saga.
//!
//! Forward chain, path-triggered:
//!
//! 1. delete the local bytes (with an in-memory backup for compensation)
//! 2. fetch and decrypt the user profile
//! 3. resolve the target node and its meta file, check write access
//! 4. remove every chunk of every version from the DHT
//! 5. remove the meta file block
//! 6. unlink the node from its parent in the in-memory tree
//! 7. commit the updated profile (point of no return)
//! 8. tell other peers (advisory)
//!
//! A deletion inferred from a remote change while the user was offline skips
//! step 1 and may skip step 2 by injecting an already-known profile through
//! [`DeleteContext::set_user_profile`].

mod chunks;
mod disk;
mod meta;
mod unlink;

pub use chunks::DeleteChunksStep;
pub use disk::DeleteFileOnDiskStep;
pub use meta::DeleteMetaFileStep;
pub use unlink::UnlinkNodeStep;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;

use common::crypto::{Secret, UserCredentials};
use common::dht::DhtPort;
use common::model::{FileTreeNode, MetaFile, UserProfile};

use crate::engine::{Process, ProcessError, ProcessStep};
use crate::fs::FileManager;
use crate::notify::{PeerNotifier, TreeEvent, TreeEventKind};
use crate::steps::{
    CommitUserProfileStep, GetUserProfileStep, NetworkContext, NotifyContext, NotifyPeersStep,
    ProfileContext, ResolveMetaFileStep, TreeContext, TreeTarget,
};

/// Saga-scoped state for one deletion.
///
/// Fixed inputs land here at construction; each step writes its results once
/// and later steps (or rollback) read them. Destroyed with the process.
pub struct DeleteContext {
    dht: Arc<dyn DhtPort>,
    files: Arc<dyn FileManager>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
    secret: Secret,
    target: TreeTarget,
    is_folder: bool,
    profile: Option<UserProfile>,
    profile_block: Option<Bytes>,
    node: Option<FileTreeNode>,
    meta: Option<MetaFile>,
    meta_block: Option<Bytes>,
}

impl DeleteContext {
    pub fn is_folder(&self) -> bool {
        self.is_folder
    }

    pub fn files(&self) -> &Arc<dyn FileManager> {
        &self.files
    }

    /// Inject an already-known profile so the fetch step is skipped.
    pub fn set_user_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
    }

    /// The node that was deleted, once resolution has run.
    pub fn deleted_node(&self) -> Option<&FileTreeNode> {
        self.node.as_ref()
    }
}

impl NetworkContext for DeleteContext {
    fn dht(&self) -> &Arc<dyn DhtPort> {
        &self.dht
    }
}

impl ProfileContext for DeleteContext {
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

impl TreeContext for DeleteContext {
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

impl NotifyContext for DeleteContext {
    fn notifier(&self) -> &Arc<dyn PeerNotifier> {
        &self.notifier
    }
    fn tree_event(&self) -> Option<TreeEvent> {
        self.node.as_ref().map(|node| TreeEvent {
            user_id: self.credentials.user_id().to_string(),
            node_id: node.id(),
            kind: TreeEventKind::Deleted,
        })
    }
}

/// The DHT-side tail every deletion runs, whatever triggered it.
fn dht_chain() -> Box<dyn ProcessStep<DeleteContext>> {
    GetUserProfileStep::new(ResolveMetaFileStep::new(DeleteChunksStep::new(
        DeleteMetaFileStep::new(UnlinkNodeStep::new(CommitUserProfileStep::new(
            NotifyPeersStep::new(),
        ))),
    )))
}

fn derive_secret(credentials: &UserCredentials) -> Result<Secret, ProcessError> {
    credentials
        .derive_secret()
        .map_err(|e| ProcessError::InvalidArgument(format!("cannot derive profile key: {e}")))
}

/// Build a deletion saga for an interactively supplied filesystem path.
///
/// The local bytes go first, then the DHT-side chain runs. Preconditions are
/// checked here, before any network step: the target must exist and a folder
/// must be empty. Violations fail construction with
/// [`ProcessError::InvalidArgument`].
pub async fn from_path(
    path: impl AsRef<Path>,
    files: Arc<dyn FileManager>,
    dht: Arc<dyn DhtPort>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
) -> Result<Process<DeleteContext>, ProcessError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    tracing::info!(path = %path.display(), "deleting file/folder from the DHT");

    if !files.exists(&path).await {
        return Err(ProcessError::InvalidArgument(format!(
            "target does not exist: {}",
            path.display()
        )));
    }
    let is_folder = files
        .is_dir(&path)
        .await
        .map_err(|e| ProcessError::InvalidArgument(e.to_string()))?;
    if is_folder
        && !files
            .dir_is_empty(&path)
            .await
            .map_err(|e| ProcessError::InvalidArgument(e.to_string()))?
    {
        return Err(ProcessError::InvalidArgument(format!(
            "folder is not empty: {}",
            path.display()
        )));
    }

    let secret = derive_secret(&credentials)?;
    let context = DeleteContext {
        dht,
        files,
        notifier,
        credentials,
        secret,
        target: TreeTarget::Path(path.clone()),
        is_folder,
        profile: None,
        profile_block: None,
        node: None,
        meta: None,
        meta_block: None,
    };

    Ok(Process::new(
        context,
        DeleteFileOnDiskStep::new(path, dht_chain()),
    ))
}

/// Build a deletion saga for a tree node, e.g. one inferred from a remote
/// change while the local user was offline. No disk step; the chain starts
/// at profile retrieval, and a known profile may be injected through the
/// context to skip the fetch entirely.
pub fn from_node(
    node: &FileTreeNode,
    files: Arc<dyn FileManager>,
    dht: Arc<dyn DhtPort>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
) -> Result<Process<DeleteContext>, ProcessError> {
    tracing::info!(node = %node.name(), "deleting tree node from the DHT");

    if node.is_folder() && !node.children().is_empty() {
        return Err(ProcessError::InvalidArgument(format!(
            "folder is not empty: {}",
            node.name()
        )));
    }

    let secret = derive_secret(&credentials)?;
    let context = DeleteContext {
        dht,
        files,
        notifier,
        credentials,
        secret,
        target: TreeTarget::Node(node.id()),
        is_folder: node.is_folder(),
        profile: None,
        profile_block: None,
        node: None,
        meta: None,
        meta_block: None,
    };

    Ok(Process::new(context, dht_chain()))
}
