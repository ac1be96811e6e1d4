//! Unlink the node from its parent in the in-memory tree.

use async_trait::async_trait;
use uuid::Uuid;

use common::model::FileTreeNode;

use crate::engine::{ProcessStep, StepError, StepOutcome};
use crate::steps::{ProfileContext, TreeContext};

use super::DeleteContext;

/// Detaches the target node from the in-memory profile tree; the removal
/// only becomes visible to other peers when the commit step that follows
/// lands the profile. The parent's child set loses the node's id here.
///
/// Compensation re-attaches the detached node under its old parent.
pub struct UnlinkNodeStep {
    detached: Option<(Uuid, FileTreeNode)>,
    next: Option<Box<dyn ProcessStep<DeleteContext>>>,
}

impl UnlinkNodeStep {
    pub fn new(next: Box<dyn ProcessStep<DeleteContext>>) -> Box<dyn ProcessStep<DeleteContext>> {
        Box::new(Self {
            detached: None,
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<DeleteContext> for UnlinkNodeStep {
    fn name(&self) -> &'static str {
        "unlink-node"
    }

    async fn execute(
        &mut self,
        ctx: &mut DeleteContext,
    ) -> Result<StepOutcome<DeleteContext>, StepError> {
        let node_id = ctx
            .node()
            .map(|node| node.id())
            .ok_or_else(|| anyhow::anyhow!("target node not resolved before unlink"))?;

        let profile = ctx
            .user_profile_mut()
            .ok_or_else(|| anyhow::anyhow!("user profile not loaded before unlink"))?;

        let parent = profile
            .tree()
            .node(&node_id)
            .and_then(|node| node.parent())
            .ok_or_else(|| StepError::NotFound(format!("parent of node {node_id}")))?;

        let detached = profile.tree_mut().detach(&node_id)?;
        tracing::debug!(node = %detached.name(), "node unlinked from tree");
        self.detached = Some((parent, detached));

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut DeleteContext) -> Result<(), StepError> {
        let Some((parent, node)) = self.detached.take() else {
            return Ok(());
        };
        let profile = ctx
            .user_profile_mut()
            .ok_or_else(|| anyhow::anyhow!("user profile gone during rollback"))?;
        profile.tree_mut().attach(parent, node)?;
        Ok(())
    }
}
