//! The file-upload saga.
//!
//! Same shape as deletion, pointed the other way:
//!
//! 1. fetch and decrypt the user profile
//! 2. chunk, encrypt and put the file content
//! 3. put the meta file (one initial version)
//! 4. attach a new node under the parent folder in the in-memory tree
//! 5. commit the updated profile (point of no return)
//! 6. tell other peers (advisory)
//!
//! The local file is read once at construction; the saga never goes back to
//! disk, so a concurrent local edit cannot tear the uploaded version.

mod link;
mod meta;

pub use link::LinkNodeStep;
pub use meta::PutMetaFileStep;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use uuid::Uuid;

use common::crypto::{Secret, UserCredentials};
use common::dht::{DhtPort, Key};
use common::model::{ChunkRef, UserProfile};

use crate::engine::{Process, ProcessError};
use crate::fs::FileManager;
use crate::notify::{PeerNotifier, TreeEvent, TreeEventKind};
use crate::steps::{
    ChunkContext, CommitUserProfileStep, GetUserProfileStep, NetworkContext, NotifyContext,
    NotifyPeersStep, ProfileContext, PutChunksStep,
};

/// Saga-scoped state for one upload.
pub struct AddContext {
    dht: Arc<dyn DhtPort>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
    secret: Secret,
    path: PathBuf,
    content: Bytes,
    profile: Option<UserProfile>,
    profile_block: Option<Bytes>,
    chunk_refs: Vec<ChunkRef>,
    meta_key: Option<Key>,
    new_node: Option<Uuid>,
}

impl AddContext {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta_key(&self) -> Option<&Key> {
        self.meta_key.as_ref()
    }

    pub(crate) fn set_meta_key(&mut self, key: Key) {
        self.meta_key = Some(key);
    }

    /// The id of the node created by the saga, once linked.
    pub fn new_node(&self) -> Option<Uuid> {
        self.new_node
    }

    pub(crate) fn set_new_node(&mut self, id: Uuid) {
        self.new_node = Some(id);
    }

    /// Inject an already-known profile so the fetch step is skipped.
    pub fn set_user_profile(&mut self, profile: UserProfile) {
        self.profile = Some(profile);
    }
}

impl NetworkContext for AddContext {
    fn dht(&self) -> &Arc<dyn DhtPort> {
        &self.dht
    }
}

impl ProfileContext for AddContext {
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

impl ChunkContext for AddContext {
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

impl NotifyContext for AddContext {
    fn notifier(&self) -> &Arc<dyn PeerNotifier> {
        &self.notifier
    }
    fn tree_event(&self) -> Option<TreeEvent> {
        self.new_node.map(|node_id| TreeEvent {
            user_id: self.credentials.user_id().to_string(),
            node_id,
            kind: TreeEventKind::Added,
        })
    }
}

/// Build an upload saga for a local file.
///
/// The file must exist and must not be a directory; its bytes are read here,
/// before any step runs. Violations fail construction with
/// [`ProcessError::InvalidArgument`].
pub async fn from_path(
    path: impl AsRef<Path>,
    files: Arc<dyn FileManager>,
    dht: Arc<dyn DhtPort>,
    notifier: Arc<dyn PeerNotifier>,
    credentials: UserCredentials,
) -> Result<Process<AddContext>, ProcessError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    tracing::info!(path = %path.display(), "adding file to the DHT");

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
            "cannot add a folder as a file: {}",
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

    let context = AddContext {
        dht,
        notifier,
        credentials,
        secret,
        path,
        content,
        profile: None,
        profile_block: None,
        chunk_refs: Vec::new(),
        meta_key: None,
        new_node: None,
    };

    let chain = GetUserProfileStep::new(PutChunksStep::new(PutMetaFileStep::new(
        LinkNodeStep::new(CommitUserProfileStep::new(NotifyPeersStep::new())),
    )));

    Ok(Process::new(context, chain))
}
