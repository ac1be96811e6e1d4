//! Attach the new file to the namespace tree.

use async_trait::async_trait;
use uuid::Uuid;

use common::model::{FileTreeNode, ModelError};

use crate::engine::{ProcessStep, StepError, StepOutcome};
use crate::steps::ProfileContext;

use super::AddContext;

/// Creates the tree node for the uploaded file and attaches it under its
/// parent folder. The mutation happens on the in-memory profile only; it
/// becomes visible to peers at commit.
///
/// Compensation detaches the node again.
pub struct LinkNodeStep {
    attached: Option<Uuid>,
    next: Option<Box<dyn ProcessStep<AddContext>>>,
}

impl LinkNodeStep {
    pub fn new(next: Box<dyn ProcessStep<AddContext>>) -> Box<dyn ProcessStep<AddContext>> {
        Box::new(Self {
            attached: None,
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<AddContext> for LinkNodeStep {
    fn name(&self) -> &'static str {
        "link-node"
    }

    async fn execute(
        &mut self,
        ctx: &mut AddContext,
    ) -> Result<StepOutcome<AddContext>, StepError> {
        let name = ctx
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| StepError::InvalidArgument("path has no file name".into()))?;
        let parent_path = ctx
            .path()
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| "/".into());
        let meta_key = *ctx
            .meta_key()
            .ok_or_else(|| anyhow::anyhow!("no meta file key to link against"))?;
        let user_id = ctx.credentials().user_id().to_string();

        let profile = ctx
            .user_profile()
            .ok_or_else(|| anyhow::anyhow!("no user profile loaded"))?;
        let parent = profile
            .tree()
            .resolve(&parent_path)
            .ok_or_else(|| StepError::NotFound(format!("no such folder: {}", parent_path.display())))?;
        if !parent.is_folder() {
            return Err(StepError::InvalidArgument(format!(
                "parent is not a folder: {}",
                parent_path.display()
            )));
        }
        if !profile.can_write(parent, &user_id) {
            return Err(StepError::PermissionDenied(format!(
                "{user_id} may not write to {}",
                parent_path.display()
            )));
        }
        let parent_id = parent.id();

        let node = FileTreeNode::new_file(name, meta_key);
        let tree = ctx
            .user_profile_mut()
            .ok_or_else(|| anyhow::anyhow!("no user profile loaded"))?
            .tree_mut();
        let id = tree.attach(parent_id, node).map_err(|e| match e {
            ModelError::DuplicateName(name) => {
                StepError::InvalidArgument(format!("'{name}' already exists in the tree"))
            }
            other => other.into(),
        })?;
        self.attached = Some(id);
        ctx.set_new_node(id);
        tracing::debug!(node = %id, "file linked into the tree");

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut AddContext) -> Result<(), StepError> {
        if let Some(id) = self.attached.take() {
            if let Some(profile) = ctx.user_profile_mut() {
                profile.tree_mut().detach(&id)?;
            }
        }
        Ok(())
    }
}
