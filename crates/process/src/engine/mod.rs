//! The process orchestrator.
//!
//! A `Process` owns one saga instance: its context, its step chain and its
//! state machine. Steps run strictly one at a time; a failure anywhere flips
//! the engine into rollback, which compensates the failed step and then every
//! completed step in reverse completion order. The caller gets exactly one
//! terminal outcome: success, a clean rollback, or a fatal (rollback itself
//! failed, distributed state unknown).

mod step;

pub use step::{ProcessStep, StepError, StepOutcome};

/// States of one saga instance.
///
/// `Idle → Running → {Succeeded, RollingBack}`,
/// `RollingBack → {RolledBack, Fatal}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Idle,
    Running,
    Succeeded,
    RollingBack,
    RolledBack,
    Fatal,
}

/// Terminal failure of a saga as reported to its caller.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// A construction-time precondition failed; no step ever ran.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A step failed and every compensation completed. The operation did not
    /// happen.
    #[error("step '{step}' failed, all compensations applied: {reason}")]
    RolledBack {
        step: &'static str,
        #[source]
        reason: StepError,
    },
    /// A step failed and a compensating action failed too. The distributed
    /// state is unknown; operator or higher-level reconciliation required.
    #[error(
        "step '{step}' failed ({reason}) and compensation of '{rollback_step}' failed: {rollback}"
    )]
    Fatal {
        step: &'static str,
        reason: StepError,
        rollback_step: &'static str,
        rollback: StepError,
    },
}

impl ProcessError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProcessError::Fatal { .. })
    }
}

/// One saga instance: context, step chain, state machine.
///
/// The context is exclusively owned by this process and handed to each step
/// by mutable reference; nothing is shared across sagas, so many processes
/// may run concurrently on the same runtime without synchronization.
pub struct Process<C> {
    state: ProcessState,
    context: C,
    head: Option<Box<dyn ProcessStep<C>>>,
}

impl<C> Process<C>
where
    C: Send + Sync,
{
    /// Bind a context to the head of a step chain.
    pub fn new(context: C, head: Box<dyn ProcessStep<C>>) -> Self {
        Process {
            state: ProcessState::Idle,
            context,
            head: Some(head),
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    /// Mutable access to the context before `start`, e.g. to inject an
    /// already-known user profile.
    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    /// Drive the step chain to a terminal state.
    ///
    /// Consumes the process; the context comes back on success so callers can
    /// read accumulated results. On failure the original step error is
    /// carried inside the [`ProcessError`].
    pub async fn start(mut self) -> Result<C, ProcessError> {
        self.state = ProcessState::Running;
        let mut completed: Vec<Box<dyn ProcessStep<C>>> = Vec::new();
        let mut current = self.head.take().expect("constructor always sets a head");

        loop {
            tracing::debug!(step = current.name(), "executing step");
            match current.execute(&mut self.context).await {
                Ok(StepOutcome::Next(next)) => {
                    completed.push(current);
                    current = next;
                }
                Ok(StepOutcome::Done) => {
                    self.state = ProcessState::Succeeded;
                    tracing::info!(steps = completed.len() + 1, "process succeeded");
                    return Ok(self.context);
                }
                Err(reason) => {
                    let failed = current.name();
                    self.state = ProcessState::RollingBack;
                    tracing::warn!(step = failed, error = %reason, "step failed, rolling back");
                    return Err(self.roll_back(current, completed, failed, reason).await);
                }
            }
        }
    }

    /// Compensate the failed step, then completed steps in reverse
    /// completion order.
    async fn roll_back(
        &mut self,
        mut failed_step: Box<dyn ProcessStep<C>>,
        mut completed: Vec<Box<dyn ProcessStep<C>>>,
        failed: &'static str,
        reason: StepError,
    ) -> ProcessError {
        if let Err(rollback) = failed_step.rollback(&mut self.context).await {
            return self.fatal(failed, reason, failed, rollback);
        }

        while let Some(mut step) = completed.pop() {
            let name = step.name();
            tracing::debug!(step = name, "compensating");
            if let Err(rollback) = step.rollback(&mut self.context).await {
                return self.fatal(failed, reason, name, rollback);
            }
        }

        self.state = ProcessState::RolledBack;
        tracing::info!(step = failed, "process rolled back cleanly");
        ProcessError::RolledBack {
            step: failed,
            reason,
        }
    }

    fn fatal(
        &mut self,
        step: &'static str,
        reason: StepError,
        rollback_step: &'static str,
        rollback: StepError,
    ) -> ProcessError {
        self.state = ProcessState::Fatal;
        // logged distinctly from ordinary failures: "rolled back" means the
        // operation did not happen, this means nobody knows
        tracing::error!(
            step,
            rollback_step,
            error = %reason,
            rollback_error = %rollback,
            "compensation failed, distributed state may be inconsistent"
        );
        ProcessError::Fatal {
            step,
            reason,
            rollback_step,
            rollback,
        }
    }
}
