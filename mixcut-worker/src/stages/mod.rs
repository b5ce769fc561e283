//! Job lifecycle stages
//!
//! [`JobService`] creates and starts jobs, [`ValidationStage`] turns an
//! uploaded sheet into track rows and a queue message, [`ProcessingStage`]
//! handles that message. Both stages catch their own errors and record them
//! on the job instead of propagating them.

mod intake;
mod processing;
mod validation;

pub use intake::{JobService, JobStatusReport};
pub use processing::{pair_outputs, ProcessingStage};
pub use validation::ValidationStage;

use mixcut_common::ObjectLocation;

/// Result of one stage invocation
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Job advanced; for processing, the output bucket and prefix
    Completed(Option<ObjectLocation>),
    /// Error recorded on the job, which is now FAILED
    Failed(String),
    /// Transient failure; leave the message for redelivery
    Retry(String),
    /// Nothing to do (job missing, already finished or not ready)
    Skipped,
}

impl StageOutcome {
    /// Whether the queue message that triggered this run should be deleted
    pub fn should_ack(&self) -> bool {
        !matches!(self, StageOutcome::Retry(_))
    }
}
