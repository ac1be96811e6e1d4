//! Upload new chunk content.

use async_trait::async_trait;
use bytes::Bytes;

use common::dht::Key;
use common::model::ChunkRef;

use crate::engine::{ProcessStep, StepError, StepOutcome};

use super::ChunkContext;

/// Fixed chunk size for uploads: 1 MiB
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Splits the context's content into fixed-size chunks, encrypts each and
/// puts it under its content address. Chunk references accumulate in the
/// context for the meta file step that follows.
///
/// Compensation removes every chunk this step put, in reverse order.
pub struct PutChunksStep<C> {
    put: Vec<Key>,
    next: Option<Box<dyn ProcessStep<C>>>,
}

impl<C: ChunkContext + 'static> PutChunksStep<C> {
    pub fn new(next: Box<dyn ProcessStep<C>>) -> Box<dyn ProcessStep<C>> {
        Box::new(Self {
            put: Vec::new(),
            next: Some(next),
        })
    }
}

#[async_trait]
impl<C: ChunkContext> ProcessStep<C> for PutChunksStep<C> {
    fn name(&self) -> &'static str {
        "put-chunks"
    }

    async fn execute(&mut self, ctx: &mut C) -> Result<StepOutcome<C>, StepError> {
        let dht = ctx.dht().clone();
        let secret = ctx.profile_secret().clone();
        let content = ctx.content().clone();

        for chunk in content.chunks(CHUNK_SIZE) {
            let block = secret.encrypt(chunk)?;
            let key = Key::content(&block);
            dht.put(key, Bytes::from(block)).await?;
            self.put.push(key);
            ctx.push_chunk_ref(ChunkRef::new(key, chunk.len() as u64));
        }
        tracing::debug!(chunks = self.put.len(), bytes = content.len(), "chunks uploaded");

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut C) -> Result<(), StepError> {
        let dht = ctx.dht().clone();
        while let Some(key) = self.put.pop() {
            dht.remove(&key).await?;
        }
        Ok(())
    }
}
