//! Scheduler error types.

use thiserror::Error;

/// Errors that can occur while driving a backend.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no scheduler found for type {0}")]
    UnknownSchedulerType(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("could not pull artifact {artifact}: {reason}")]
    ArtifactPullFailed { artifact: String, reason: String },

    #[error("job ID {0} does not exist")]
    JobNotFound(String),

    #[error("invalid scheduler configuration: {0}")]
    Config(String),
}

impl SchedulerError {
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }
}

impl From<reqwest::Error> for SchedulerError {
    fn from(e: reqwest::Error) -> Self {
        Self::BackendUnavailable(e.to_string())
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
