//! Fetch and decrypt the user profile.

use async_trait::async_trait;

use common::block::BlockEncoded;
use common::dht::{DhtError, Key};
use common::model::UserProfile;

use crate::engine::{ProcessStep, StepError, StepOutcome};

use super::ProfileContext;

/// Fetches the profile block from its logical location, decrypts it with the
/// credential-derived key and populates the context.
///
/// Skipped entirely (zero DHT calls) when the context already holds a
/// profile, e.g. one injected by a caller that just fetched it for another
/// purpose. Read-only; no compensation.
pub struct GetUserProfileStep<C> {
    next: Option<Box<dyn ProcessStep<C>>>,
}

impl<C: ProfileContext + 'static> GetUserProfileStep<C> {
    pub fn new(next: Box<dyn ProcessStep<C>>) -> Box<dyn ProcessStep<C>> {
        Box::new(Self { next: Some(next) })
    }
}

#[async_trait]
impl<C: ProfileContext> ProcessStep<C> for GetUserProfileStep<C> {
    fn name(&self) -> &'static str {
        "get-user-profile"
    }

    async fn execute(&mut self, ctx: &mut C) -> Result<StepOutcome<C>, StepError> {
        if ctx.user_profile().is_some() {
            tracing::debug!("user profile already supplied, skipping fetch");
        } else {
            let dht = ctx.dht().clone();
            let user_id = ctx.credentials().user_id().to_string();
            let key = Key::profile(&user_id);

            let block = match dht.get(&key).await {
                Ok(block) => block,
                Err(DhtError::NotFound) => {
                    return Err(StepError::NotFound(format!("user profile for '{user_id}'")))
                }
                Err(e) => return Err(e.into()),
            };

            let plain = ctx.profile_secret().decrypt(&block)?;
            let profile = UserProfile::decode(&plain)?;
            tracing::debug!(user = %user_id, version = profile.version(), "fetched user profile");

            ctx.set_profile_block(block);
            ctx.set_user_profile(profile);
        }

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }
}
