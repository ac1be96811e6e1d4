//! Best-effort peer notification.
//!
//! Once a saga's profile commit lands, other peers should hear about the
//! change so they can re-fetch the profile. The broadcast is advisory: it
//! sits outside the transactional boundary and its failure never rolls a
//! committed mutation back.

use async_trait::async_trait;
use uuid::Uuid;

/// What happened to the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEventKind {
    Added,
    Updated,
    Deleted,
}

/// One committed change to a user's file tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEvent {
    pub user_id: String,
    pub node_id: Uuid,
    pub kind: TreeEventKind,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notify error: {0}")]
    Default(#[from] anyhow::Error),
}

/// Outbound notification port.
#[async_trait]
pub trait PeerNotifier: Send + Sync {
    async fn broadcast(&self, event: TreeEvent) -> Result<(), NotifyError>;
}

/// Discards every event. For setups with nobody to tell.
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl PeerNotifier for NoopNotifier {
    async fn broadcast(&self, _event: TreeEvent) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Forwards events into a flume channel, e.g. toward a broadcast loop or a
/// test assertion.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: flume::Sender<TreeEvent>,
}

impl ChannelNotifier {
    pub fn new(sender: flume::Sender<TreeEvent>) -> Self {
        Self { sender }
    }

    /// Convenience pair constructor.
    pub fn unbounded() -> (Self, flume::Receiver<TreeEvent>) {
        let (sender, receiver) = flume::unbounded();
        (Self::new(sender), receiver)
    }
}

#[async_trait]
impl PeerNotifier for ChannelNotifier {
    async fn broadcast(&self, event: TreeEvent) -> Result<(), NotifyError> {
        self.sender
            .send_async(event)
            .await
            .map_err(|e| anyhow::anyhow!("notification channel closed: {}", e))?;
        Ok(())
    }
}
