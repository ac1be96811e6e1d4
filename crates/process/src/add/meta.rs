//! Publish the initial meta file.

use async_trait::async_trait;
use bytes::Bytes;

use common::block::BlockEncoded;
use common::dht::Key;
use common::model::MetaFile;

use crate::engine::{ProcessStep, StepError, StepOutcome};
use crate::steps::{ChunkContext, NetworkContext, ProfileContext};

use super::AddContext;

/// Builds a meta file with one version from the chunk references collected so
/// far, encrypts it and puts it under its content address. The key is left in
/// the context for the link step.
///
/// Compensation removes the block again.
pub struct PutMetaFileStep {
    put: Option<Key>,
    next: Option<Box<dyn ProcessStep<AddContext>>>,
}

impl PutMetaFileStep {
    pub fn new(next: Box<dyn ProcessStep<AddContext>>) -> Box<dyn ProcessStep<AddContext>> {
        Box::new(Self {
            put: None,
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<AddContext> for PutMetaFileStep {
    fn name(&self) -> &'static str {
        "put-meta-file"
    }

    async fn execute(
        &mut self,
        ctx: &mut AddContext,
    ) -> Result<StepOutcome<AddContext>, StepError> {
        let meta = MetaFile::initial(ctx.chunk_refs().to_vec());
        let plain = meta.encode()?;
        let block = ctx.profile_secret().encrypt(&plain)?;
        let key = Key::content(&block);

        let dht = ctx.dht().clone();
        dht.put(key, Bytes::from(block)).await?;
        self.put = Some(key);
        ctx.set_meta_key(key);
        tracing::debug!(meta = %key, "meta file published");

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut AddContext) -> Result<(), StepError> {
        if let Some(key) = self.put.take() {
            let dht = ctx.dht().clone();
            dht.remove(&key).await?;
        }
        Ok(())
    }
}
