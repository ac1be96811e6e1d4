//! Resolve the target tree node and its meta file.

use async_trait::async_trait;

use common::block::BlockEncoded;
use common::dht::DhtError;
use common::model::MetaFile;

use crate::engine::{ProcessStep, StepError, StepOutcome};

use super::{TreeContext, TreeTarget};

/// Looks the saga's target up in the fetched tree, verifies the acting user
/// holds write access, and for files fetches and decrypts the meta file.
/// Folders carry no content, so nothing is fetched for them.
///
/// Read-only; no compensation. Fails with `NotFound` for an absent node or
/// meta block and `PermissionDenied` before any mutation is attempted.
pub struct ResolveMetaFileStep<C> {
    next: Option<Box<dyn ProcessStep<C>>>,
}

impl<C: TreeContext + 'static> ResolveMetaFileStep<C> {
    pub fn new(next: Box<dyn ProcessStep<C>>) -> Box<dyn ProcessStep<C>> {
        Box::new(Self { next: Some(next) })
    }
}

#[async_trait]
impl<C: TreeContext> ProcessStep<C> for ResolveMetaFileStep<C> {
    fn name(&self) -> &'static str {
        "resolve-meta-file"
    }

    async fn execute(&mut self, ctx: &mut C) -> Result<StepOutcome<C>, StepError> {
        let profile = ctx
            .user_profile()
            .ok_or_else(|| anyhow::anyhow!("user profile not loaded before resolution"))?;

        let node = match ctx.target() {
            TreeTarget::Path(path) => profile.tree().resolve(path),
            TreeTarget::Node(id) => profile.tree().node(id),
        }
        .cloned()
        .ok_or_else(|| StepError::NotFound(format!("tree node for {}", ctx.target())))?;

        if !profile.can_write(&node, ctx.credentials().user_id()) {
            return Err(StepError::PermissionDenied(format!(
                "user '{}' may not modify '{}'",
                ctx.credentials().user_id(),
                node.name(),
            )));
        }

        if node.is_file() {
            let meta_key = *node
                .meta()
                .ok_or_else(|| anyhow::anyhow!("file node without meta reference"))?;
            let dht = ctx.dht().clone();
            let block = match dht.get(&meta_key).await {
                Ok(block) => block,
                Err(DhtError::NotFound) => {
                    return Err(StepError::NotFound(format!("meta file {meta_key}")))
                }
                Err(e) => return Err(e.into()),
            };
            let plain = ctx.profile_secret().decrypt(&block)?;
            let meta = MetaFile::decode(&plain)?;
            tracing::debug!(
                node = %node.name(),
                versions = meta.versions().len(),
                "resolved meta file"
            );
            ctx.set_meta_file(meta, block);
        } else {
            tracing::debug!(node = %node.name(), "target is a folder, no meta file");
        }

        ctx.set_node(node);

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }
}
