//! Remove the meta file block.

use async_trait::async_trait;

use common::dht::Key;

use crate::engine::{ProcessStep, StepError, StepOutcome};
use crate::steps::{NetworkContext, TreeContext};

use super::DeleteContext;

/// Removes the target file's meta file from the DHT. Folders have none, so
/// the step passes through for them.
///
/// Compensation re-puts the ciphertext cached by the resolution step.
pub struct DeleteMetaFileStep {
    removed: Option<Key>,
    next: Option<Box<dyn ProcessStep<DeleteContext>>>,
}

impl DeleteMetaFileStep {
    pub fn new(next: Box<dyn ProcessStep<DeleteContext>>) -> Box<dyn ProcessStep<DeleteContext>> {
        Box::new(Self {
            removed: None,
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<DeleteContext> for DeleteMetaFileStep {
    fn name(&self) -> &'static str {
        "delete-meta-file"
    }

    async fn execute(
        &mut self,
        ctx: &mut DeleteContext,
    ) -> Result<StepOutcome<DeleteContext>, StepError> {
        let meta_key = ctx.node().and_then(|node| node.meta().copied());

        if let Some(key) = meta_key {
            let dht = ctx.dht().clone();
            dht.remove(&key).await?;
            self.removed = Some(key);
            tracing::debug!(meta = %key, "meta file removed from the DHT");
        }

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut DeleteContext) -> Result<(), StepError> {
        let Some(key) = self.removed.take() else {
            return Ok(());
        };
        let block = ctx.meta_block().cloned().ok_or_else(|| {
            StepError::NotRecoverable(format!("no cached meta file to re-put under {key}"))
        })?;
        let dht = ctx.dht().clone();
        dht.put(key, block).await?;
        Ok(())
    }
}
