//! Commit the updated user profile.

use async_trait::async_trait;
use bytes::Bytes;

use common::block::BlockEncoded;
use common::dht::{DhtError, Key};

use crate::engine::{ProcessStep, StepError, StepOutcome};

use super::ProfileContext;

/// Writes the whole mutated profile back to its logical location, encrypted,
/// with the version counter bumped. This is the saga's point of no return:
/// once the put lands, the mutation is durable from other peers' view.
///
/// Compensation re-puts the profile ciphertext that was current when the
/// saga fetched it (or removes the key if no profile existed).
pub struct CommitUserProfileStep<C> {
    previous: Option<Bytes>,
    committed: bool,
    next: Option<Box<dyn ProcessStep<C>>>,
}

impl<C: ProfileContext + 'static> CommitUserProfileStep<C> {
    pub fn new(next: Box<dyn ProcessStep<C>>) -> Box<dyn ProcessStep<C>> {
        Box::new(Self {
            previous: None,
            committed: false,
            next: Some(next),
        })
    }
}

#[async_trait]
impl<C: ProfileContext> ProcessStep<C> for CommitUserProfileStep<C> {
    fn name(&self) -> &'static str {
        "commit-user-profile"
    }

    async fn execute(&mut self, ctx: &mut C) -> Result<StepOutcome<C>, StepError> {
        let dht = ctx.dht().clone();
        let key = Key::profile(ctx.credentials().user_id());

        // snapshot the pre-commit block for compensation; the fetch step
        // cached it unless the profile was injected, in which case we ask
        // the network once more
        self.previous = ctx.profile_block().cloned();
        if self.previous.is_none() {
            match dht.get(&key).await {
                Ok(block) => self.previous = Some(block),
                Err(DhtError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let profile = ctx
            .user_profile_mut()
            .ok_or_else(|| anyhow::anyhow!("no user profile to commit"))?;
        profile.bump_version();
        let version = profile.version();
        let plain = profile.encode()?;

        let block = ctx.profile_secret().encrypt(&plain)?;
        dht.put(key, Bytes::from(block)).await?;
        self.committed = true;
        tracing::info!(version, "user profile committed");

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut C) -> Result<(), StepError> {
        if !self.committed {
            return Ok(());
        }
        let dht = ctx.dht().clone();
        let key = Key::profile(ctx.credentials().user_id());
        match self.previous.take() {
            Some(block) => dht.put(key, block).await?,
            None => dht.remove(&key).await?,
        }
        Ok(())
    }
}
