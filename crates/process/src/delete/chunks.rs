//! Remove every chunk referenced by the meta file.

use async_trait::async_trait;
use bytes::Bytes;

use common::dht::Key;

use crate::engine::{ProcessStep, StepError, StepOutcome};
use crate::steps::{NetworkContext, TreeContext};

use super::DeleteContext;

/// Issues a DHT remove for every chunk of every version, caching each
/// chunk's bytes first so removal can be compensated. Folders reference no
/// content, so the step just passes through for them.
///
/// Compensation re-puts the cached bytes. Chunks whose bytes could not be
/// fetched before removal are gone for good once removed; the cache is the
/// only recovery path, and the gap is logged rather than masked.
pub struct DeleteChunksStep {
    removed: Vec<(Key, Option<Bytes>)>,
    next: Option<Box<dyn ProcessStep<DeleteContext>>>,
}

impl DeleteChunksStep {
    pub fn new(next: Box<dyn ProcessStep<DeleteContext>>) -> Box<dyn ProcessStep<DeleteContext>> {
        Box::new(Self {
            removed: Vec::new(),
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<DeleteContext> for DeleteChunksStep {
    fn name(&self) -> &'static str {
        "delete-chunks"
    }

    async fn execute(
        &mut self,
        ctx: &mut DeleteContext,
    ) -> Result<StepOutcome<DeleteContext>, StepError> {
        let dht = ctx.dht().clone();

        let chunk_keys: Vec<Key> = match ctx.meta_file() {
            Some(meta) => meta.all_chunks().map(|c| *c.key()).collect(),
            None => Vec::new(),
        };

        for key in chunk_keys {
            // cache before removing; best effort, the removal is the point
            let backup = dht.get(&key).await.ok();
            if backup.is_none() {
                tracing::warn!(chunk = %key, "chunk unavailable before removal, compensation will skip it");
            }
            dht.remove(&key).await?;
            self.removed.push((key, backup));
        }
        tracing::debug!(chunks = self.removed.len(), "chunks removed from the DHT");

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut DeleteContext) -> Result<(), StepError> {
        let dht = ctx.dht().clone();
        while let Some((key, backup)) = self.removed.pop() {
            match backup {
                Some(bytes) => dht.put(key, bytes).await?,
                // nothing cached; the chunk cannot be re-uploaded from here
                None => tracing::warn!(chunk = %key, "no cached bytes, chunk not restored"),
            }
        }
        Ok(())
    }
}
