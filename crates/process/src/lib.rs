/**
 * The step-chain process engine: the Process
 *  orchestrator, the ProcessStep trait and the
 *  outcome/error taxonomy shared by every saga.
 */
pub mod engine;
/**
 * Steps shared across saga kinds, together with the
 *  capability traits their contexts implement.
 */
pub mod steps;

/**
 * Concrete sagas. Each module wires a step chain and
 *  context for one mutation kind against the DHT.
 */
pub mod add;
pub mod delete;
pub mod update;

/**
 * Bootstrap network configuration (peripheral).
 */
pub mod config;
/**
 * Local filesystem collaborator port.
 */
pub mod fs;
/**
 * Best-effort peer notification port.
 */
pub mod notify;

pub mod prelude {
    pub use crate::engine::{Process, ProcessError, ProcessState, ProcessStep, StepError, StepOutcome};
    pub use crate::fs::{FileManager, FsError, LocalFileManager};
    pub use crate::notify::{ChannelNotifier, NoopNotifier, PeerNotifier, TreeEvent, TreeEventKind};
}
