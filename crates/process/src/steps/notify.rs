//! Broadcast the committed change to other peers.

use async_trait::async_trait;

use crate::engine::{ProcessStep, StepError, StepOutcome};

use super::NotifyContext;

/// Tail step of every mutating saga: tell other peers the tree changed so
/// they can re-fetch the profile.
///
/// Strictly advisory. The commit before this step is the transactional
/// boundary; a failed broadcast is logged and the saga still succeeds.
pub struct NotifyPeersStep;

impl NotifyPeersStep {
    #[allow(clippy::new_ret_no_self)]
    pub fn new<C: NotifyContext>() -> Box<dyn ProcessStep<C>> {
        Box::new(Self)
    }
}

#[async_trait]
impl<C: NotifyContext> ProcessStep<C> for NotifyPeersStep {
    fn name(&self) -> &'static str {
        "notify-peers"
    }

    async fn execute(&mut self, ctx: &mut C) -> Result<StepOutcome<C>, StepError> {
        match ctx.tree_event() {
            Some(event) => {
                if let Err(e) = ctx.notifier().broadcast(event).await {
                    tracing::warn!(error = %e, "peer notification failed (advisory, not rolled back)");
                }
            }
            None => tracing::debug!("no tree event to broadcast"),
        }
        Ok(StepOutcome::Done)
    }
}
