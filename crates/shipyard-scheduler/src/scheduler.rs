//! The backend-agnostic scheduler capability.

use async_trait::async_trait;

use crate::error::SchedulerResult;
use crate::job::{JobId, JobState};

/// Creates, starts, observes and tears down jobs on one backend.
///
/// Implementations keep their own job → backend handle mapping and must be
/// safe to share between tasks.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Provision (but do not start) a job running `artifact` with `command`.
    async fn create(&self, job: &JobId, artifact: &str, command: &[String]) -> SchedulerResult<()>;

    /// Start a created job. Fails with `JobNotFound` if `create` was never called.
    async fn start(&self, job: &JobId) -> SchedulerResult<()>;

    /// Observe a job. Never fails: backend errors and untracked jobs are `Unknown`.
    async fn state(&self, job: &JobId) -> JobState;

    /// Stop a running job. A job that was never started is left alone.
    async fn stop(&self, job: &JobId) -> SchedulerResult<()>;

    /// Remove a job entirely. A job that was never created is left alone.
    async fn destroy(&self, job: &JobId) -> SchedulerResult<()>;
}
