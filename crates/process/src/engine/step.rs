//! The unit of work inside a saga.

use async_trait::async_trait;

use common::block::CodecError;
use common::crypto::{CredentialError, SecretError};
use common::dht::DhtError;
use common::model::ModelError;

use crate::fs::FsError;

/// Failure of one step's execute or rollback.
///
/// Steps never panic past the engine; every failure mode lands in one of
/// these variants and is interpreted by the process state machine.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("network failure: {0}")]
    Network(#[from] DhtError),
    #[error("decryption failure: {0}")]
    Decryption(#[from] SecretError),
    #[error("credential failure: {0}")]
    Credential(#[from] CredentialError),
    #[error("codec failure: {0}")]
    Codec(#[from] CodecError),
    #[error("tree failure: {0}")]
    Model(#[from] ModelError),
    #[error("filesystem failure: {0}")]
    Fs(#[from] FsError),
    #[error("compensation impossible: {0}")]
    NotRecoverable(String),
    #[error("step error: {0}")]
    Other(#[from] anyhow::Error),
}

/// What a step hands back on success: the explicit next step of the chain,
/// or `Done` to finish the saga. The continuation is a value, so steps can
/// decide the rest of the chain from runtime data.
pub enum StepOutcome<C> {
    Next(Box<dyn ProcessStep<C>>),
    Done,
}

/// One asynchronous unit of work plus its compensation.
///
/// `execute` typically issues one or more DHT calls, validates the result and
/// writes derived values into the context. `rollback` is the best-effort
/// inverse, invoked by the engine in reverse completion order when a later
/// step fails; steps may keep private state from execute for it. The default
/// rollback is a no-op, which is right for read-only steps.
#[async_trait]
pub trait ProcessStep<C>: Send
where
    C: Send + Sync,
{
    fn name(&self) -> &'static str;

    async fn execute(&mut self, ctx: &mut C) -> Result<StepOutcome<C>, StepError>;

    async fn rollback(&mut self, _ctx: &mut C) -> Result<(), StepError> {
        Ok(())
    }
}
