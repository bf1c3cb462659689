//! MockScheduler: in-process recording scheduler for tests.
//!
//! Records every call in order and reports a configurable state for
//! started jobs. Clones share the same recording, so a test can hand one
//! clone to the code under test and inspect the other.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{JobId, JobState};
use crate::scheduler::Scheduler;

/// Settings for the mock backend when selected by configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MockSettings {
    /// State reported for every started job.
    pub state: JobState,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            state: JobState::Running,
        }
    }
}

/// One recorded scheduler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Create {
        job: String,
        artifact: String,
        command: Vec<String>,
    },
    Start { job: String },
    State { job: String },
    Stop { job: String },
    Destroy { job: String },
}

impl MockCall {
    pub fn job(&self) -> &str {
        match self {
            Self::Create { job, .. }
            | Self::Start { job }
            | Self::State { job }
            | Self::Stop { job }
            | Self::Destroy { job } => job,
        }
    }
}

#[derive(Debug)]
struct MockJob {
    started: bool,
}

#[derive(Debug, Default)]
struct MockInner {
    calls: Vec<MockCall>,
    jobs: HashMap<String, MockJob>,
    /// States handed out one per `state` call; the last one repeats.
    scripted: VecDeque<JobState>,
    /// Process types whose `create` fails.
    failing_creates: HashSet<String>,
}

#[derive(Debug, Clone)]
pub struct MockScheduler {
    state: JobState,
    inner: Arc<Mutex<MockInner>>,
}

impl Default for MockScheduler {
    fn default() -> Self {
        Self::new(&MockSettings::default())
    }
}

impl MockScheduler {
    pub fn new(settings: &MockSettings) -> Self {
        Self {
            state: settings.state,
            inner: Arc::new(Mutex::new(MockInner::default())),
        }
    }

    /// Report `state` for every started job.
    pub fn with_state(state: JobState) -> Self {
        Self::new(&MockSettings { state })
    }

    /// Report these states, one per `state` call, repeating the last.
    pub async fn script_states(&self, states: impl IntoIterator<Item = JobState>) {
        self.inner.lock().await.scripted = states.into_iter().collect();
    }

    /// Make `create` fail for jobs of this process type.
    pub async fn fail_create_for(&self, process_type: &str) {
        self.inner
            .lock()
            .await
            .failing_creates
            .insert(process_type.to_string());
    }

    /// All calls so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.inner.lock().await.calls.clone()
    }

    /// Recorded calls for one job.
    pub async fn calls_for(&self, job: &str) -> Vec<MockCall> {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.job() == job)
            .cloned()
            .collect()
    }

    /// IDs of jobs created and not yet destroyed.
    pub async fn live_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<_> = self.inner.lock().await.jobs.keys().cloned().collect();
        jobs.sort();
        jobs
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    async fn create(&self, job: &JobId, artifact: &str, command: &[String]) -> SchedulerResult<()> {
        let name = job.to_string();
        let mut inner = self.inner.lock().await;
        inner.calls.push(MockCall::Create {
            job: name.clone(),
            artifact: artifact.to_string(),
            command: command.to_vec(),
        });
        if inner.failing_creates.contains(&job.process_type) {
            return Err(SchedulerError::backend(format!(
                "mock refused to create {name}"
            )));
        }
        debug!(job = %name, %artifact, "mock job created");
        inner.jobs.insert(name, MockJob { started: false });
        Ok(())
    }

    async fn start(&self, job: &JobId) -> SchedulerResult<()> {
        let name = job.to_string();
        let mut inner = self.inner.lock().await;
        inner.calls.push(MockCall::Start { job: name.clone() });
        match inner.jobs.get_mut(&name) {
            Some(entry) => {
                entry.started = true;
                Ok(())
            }
            None => Err(SchedulerError::JobNotFound(name)),
        }
    }

    async fn state(&self, job: &JobId) -> JobState {
        let name = job.to_string();
        let mut inner = self.inner.lock().await;
        inner.calls.push(MockCall::State { job: name.clone() });
        let started = inner.jobs.get(&name).map(|entry| entry.started);
        match started {
            None => JobState::Unknown,
            Some(false) => JobState::Pending,
            Some(true) => {
                if inner.scripted.len() > 1 {
                    inner.scripted.pop_front().unwrap_or(self.state)
                } else {
                    inner.scripted.front().copied().unwrap_or(self.state)
                }
            }
        }
    }

    async fn stop(&self, job: &JobId) -> SchedulerResult<()> {
        let name = job.to_string();
        let mut inner = self.inner.lock().await;
        inner.calls.push(MockCall::Stop { job: name.clone() });
        if let Some(entry) = inner.jobs.get_mut(&name) {
            entry.started = false;
        }
        Ok(())
    }

    async fn destroy(&self, job: &JobId) -> SchedulerResult<()> {
        let name = job.to_string();
        let mut inner = self.inner.lock().await;
        inner.calls.push(MockCall::Destroy { job: name.clone() });
        inner.jobs.remove(&name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn web() -> JobId {
        JobId::new("acme", 1, "web")
    }

    #[tokio::test]
    async fn lifecycle_is_recorded_in_order() {
        let mock = MockScheduler::default();
        mock.create(&web(), "acme/web", &["run-web".to_string()]).await.unwrap();
        mock.start(&web()).await.unwrap();
        assert_eq!(mock.state(&web()).await, JobState::Running);
        mock.stop(&web()).await.unwrap();
        mock.destroy(&web()).await.unwrap();

        let calls = mock.calls().await;
        assert_eq!(calls.len(), 5);
        assert!(matches!(&calls[0], MockCall::Create { job, artifact, .. }
            if job == "acme_v1.web.1" && artifact == "acme/web"));
        assert!(matches!(&calls[4], MockCall::Destroy { .. }));
        assert!(mock.live_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn start_without_create_is_job_not_found() {
        let mock = MockScheduler::default();
        let err = mock.start(&web()).await.unwrap_err();
        assert!(matches!(err, SchedulerError::JobNotFound(id) if id == "acme_v1.web.1"));
    }

    #[tokio::test]
    async fn untracked_job_is_unknown() {
        let mock = MockScheduler::default();
        assert_eq!(mock.state(&web()).await, JobState::Unknown);
    }

    #[tokio::test]
    async fn created_but_not_started_is_pending() {
        let mock = MockScheduler::default();
        mock.create(&web(), "acme/web", &[]).await.unwrap();
        assert_eq!(mock.state(&web()).await, JobState::Pending);
    }

    #[tokio::test]
    async fn configured_state_is_reported() {
        let mock = MockScheduler::with_state(JobState::Failed);
        mock.create(&web(), "acme/web", &[]).await.unwrap();
        mock.start(&web()).await.unwrap();
        assert_eq!(mock.state(&web()).await, JobState::Failed);
    }

    #[tokio::test]
    async fn scripted_states_repeat_the_last() {
        let mock = MockScheduler::default();
        mock.script_states([JobState::Pending, JobState::Running]).await;
        mock.create(&web(), "acme/web", &[]).await.unwrap();
        mock.start(&web()).await.unwrap();

        assert_eq!(mock.state(&web()).await, JobState::Pending);
        assert_eq!(mock.state(&web()).await, JobState::Running);
        assert_eq!(mock.state(&web()).await, JobState::Running);
    }

    #[tokio::test]
    async fn failing_create_does_not_track_job() {
        let mock = MockScheduler::default();
        mock.fail_create_for("web").await;

        let err = mock.create(&web(), "acme/web", &[]).await.unwrap_err();
        assert!(matches!(err, SchedulerError::BackendUnavailable(_)));
        assert!(mock.live_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn clones_share_recordings() {
        let mock = MockScheduler::default();
        let clone = mock.clone();
        clone.create(&web(), "acme/web", &[]).await.unwrap();

        assert_eq!(mock.calls_for("acme_v1.web.1").await.len(), 1);
    }
}
