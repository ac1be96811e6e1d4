//! Publish the extended meta file and repoint the tree node.

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use common::block::BlockEncoded;
use common::dht::Key;

use crate::engine::{ProcessStep, StepError, StepOutcome};
use crate::steps::{ChunkContext, NetworkContext, ProfileContext, TreeContext};

use super::UpdateContext;

/// Appends a version built from the uploaded chunk references to the target's
/// meta file, publishes the result under its new content address, drops the
/// superseded block and repoints the tree node. The node mutation is
/// in-memory only until commit.
///
/// Compensation restores the old node link, re-puts the superseded block from
/// the resolution step's cache and removes the new one.
pub struct PutNewVersionStep {
    put: Option<Key>,
    removed_old: Option<Key>,
    repointed: Option<(Uuid, Key)>,
    next: Option<Box<dyn ProcessStep<UpdateContext>>>,
}

impl PutNewVersionStep {
    pub fn new(next: Box<dyn ProcessStep<UpdateContext>>) -> Box<dyn ProcessStep<UpdateContext>> {
        Box::new(Self {
            put: None,
            removed_old: None,
            repointed: None,
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<UpdateContext> for PutNewVersionStep {
    fn name(&self) -> &'static str {
        "put-new-version"
    }

    async fn execute(
        &mut self,
        ctx: &mut UpdateContext,
    ) -> Result<StepOutcome<UpdateContext>, StepError> {
        let node = ctx
            .node()
            .ok_or_else(|| anyhow::anyhow!("no resolved node to update"))?;
        if node.is_folder() {
            return Err(StepError::InvalidArgument(format!(
                "cannot update a folder: {}",
                node.name()
            )));
        }
        let node_id = node.id();
        let old_key = *node
            .meta()
            .ok_or_else(|| anyhow::anyhow!("file node carries no meta file key"))?;

        let mut meta = ctx
            .meta_file()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no resolved meta file to extend"))?;
        let version = meta.push_version(ctx.chunk_refs().to_vec()).index();
        let plain = meta.encode()?;
        let block = ctx.profile_secret().encrypt(&plain)?;
        let new_key = Key::content(&block);

        let dht = ctx.dht().clone();
        dht.put(new_key, Bytes::from(block)).await?;
        self.put = Some(new_key);

        // the old block is superseded; its cached ciphertext backs compensation
        dht.remove(&old_key).await?;
        self.removed_old = Some(old_key);

        let tree = ctx
            .user_profile_mut()
            .ok_or_else(|| anyhow::anyhow!("no user profile loaded"))?
            .tree_mut();
        tree.node_mut(&node_id)
            .ok_or_else(|| anyhow::anyhow!("resolved node vanished from the tree"))?
            .set_meta(new_key);
        self.repointed = Some((node_id, old_key));
        ctx.set_new_meta_key(new_key);
        tracing::debug!(version, meta = %new_key, "new file version published");

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut UpdateContext) -> Result<(), StepError> {
        if let Some((node_id, old_key)) = self.repointed.take() {
            if let Some(profile) = ctx.user_profile_mut() {
                if let Some(node) = profile.tree_mut().node_mut(&node_id) {
                    node.set_meta(old_key);
                }
            }
        }

        let dht = ctx.dht().clone();
        if let Some(old_key) = self.removed_old.take() {
            let block = ctx.meta_block().cloned().ok_or_else(|| {
                StepError::NotRecoverable(format!("no cached meta file to re-put under {old_key}"))
            })?;
            dht.put(old_key, block).await?;
        }
        if let Some(new_key) = self.put.take() {
            dht.remove(&new_key).await?;
        }
        Ok(())
    }
}
