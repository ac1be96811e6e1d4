//! Remove the local bytes before touching the DHT.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use crate::engine::{ProcessStep, StepError, StepOutcome};

use super::DeleteContext;

/// Deletes the target from the local disk, keeping an in-memory backup so a
/// later failure can put it back. A file that has already vanished locally
/// is fine; the DHT-side deletion still has to run.
///
/// Compensation restores from the backup. A deleted file without a backup is
/// non-compensable and escalates to a fatal outcome.
pub struct DeleteFileOnDiskStep {
    path: PathBuf,
    deleted: bool,
    was_folder: bool,
    backup: Option<Bytes>,
    next: Option<Box<dyn ProcessStep<DeleteContext>>>,
}

impl DeleteFileOnDiskStep {
    pub fn new(
        path: PathBuf,
        next: Box<dyn ProcessStep<DeleteContext>>,
    ) -> Box<dyn ProcessStep<DeleteContext>> {
        Box::new(Self {
            path,
            deleted: false,
            was_folder: false,
            backup: None,
            next: Some(next),
        })
    }
}

#[async_trait]
impl ProcessStep<DeleteContext> for DeleteFileOnDiskStep {
    fn name(&self) -> &'static str {
        "delete-file-on-disk"
    }

    async fn execute(
        &mut self,
        ctx: &mut DeleteContext,
    ) -> Result<StepOutcome<DeleteContext>, StepError> {
        let files = ctx.files().clone();

        if files.exists(&self.path).await {
            self.was_folder = ctx.is_folder();
            if !self.was_folder {
                self.backup = Some(files.read(&self.path).await?);
            }
            files.remove(&self.path).await?;
            self.deleted = true;
            tracing::debug!(path = %self.path.display(), "deleted from disk");
        } else {
            tracing::debug!(path = %self.path.display(), "already gone from disk");
        }

        Ok(StepOutcome::Next(
            self.next.take().expect("forward pass enters a step once"),
        ))
    }

    async fn rollback(&mut self, ctx: &mut DeleteContext) -> Result<(), StepError> {
        if !self.deleted {
            return Ok(());
        }
        let files = ctx.files().clone();
        if self.was_folder {
            files.restore(&self.path, None).await?;
        } else {
            match self.backup.take() {
                Some(backup) => files.restore(&self.path, Some(backup)).await?,
                None => {
                    return Err(StepError::NotRecoverable(format!(
                        "no cached copy of {} to restore",
                        self.path.display()
                    )))
                }
            }
        }
        Ok(())
    }
}
