//! Release error types.

use shipyard_scheduler::SchedulerError;
use shipyard_state::StateError;
use thiserror::Error;

/// Errors from publishing, rolling back or managing releases.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The release carries no build, so there is nothing to run.
    #[error("cannot publish {0}: no build associated with this release")]
    NoBuildToPublish(String),

    /// The scheduler could not be constructed.
    #[error("could not publish release: {0}")]
    SchedulerUnavailable(#[source] SchedulerError),

    /// A job did not reach `Running` after being started.
    #[error("job ID {0} is flapping")]
    JobFlapping(String),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    State(#[from] StateError),
}

impl ReleaseError {
    /// Whether any scheduler work was attempted before the failure.
    ///
    /// `NoBuildToPublish` and ledger validation errors happen before the
    /// scheduler is touched; a config-only update hitting them is benign.
    pub fn deployment_attempted(&self) -> bool {
        matches!(
            self,
            Self::SchedulerUnavailable(_) | Self::JobFlapping(_) | Self::Scheduler(_)
        )
    }
}

pub type ReleaseResult<T> = Result<T, ReleaseError>;
