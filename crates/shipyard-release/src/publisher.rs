//! Publisher: turns a release into running jobs.
//!
//! ```text
//!  Release ──► build? ──no──► NoBuildToPublish   (no scheduler calls)
//!                │
//!                ▼
//!       resolve scheduler ──err──► SchedulerUnavailable
//!                │
//!                ▼  for each process type, sorted
//!   create(job, image, sh -c line) ─► start(job) ─► poll state
//!                                                   │
//!                                      not Running ─┴─► JobFlapping(job)
//! ```

use std::sync::Arc;

use serde::Serialize;
use shipyard_scheduler::{
    new_scheduler, shell_command, JobId, JobState, Scheduler, SchedulerResult, SchedulerSettings,
};
use shipyard_state::Release;
use tracing::{debug, info, warn};

use crate::error::{ReleaseError, ReleaseResult};
use crate::poll::PollPolicy;

/// Where the publisher gets its scheduler from.
#[derive(Clone)]
pub enum SchedulerSource {
    /// Build a fresh backend from settings on every publish. Backends keep
    /// their job maps in memory, so jobs from earlier publishes are not
    /// visible to later ones.
    Settings(SchedulerSettings),
    /// Use one long-lived backend for every publish.
    Shared(Arc<dyn Scheduler>),
}

impl SchedulerSource {
    fn resolve(&self) -> SchedulerResult<Arc<dyn Scheduler>> {
        match self {
            Self::Settings(settings) => new_scheduler(settings),
            Self::Shared(scheduler) => Ok(scheduler.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PublishOptions {
    /// Stop and destroy jobs already created by a publish that fails
    /// part-way. Off by default: a failed publish leaves earlier process
    /// types in place.
    pub teardown_on_failure: bool,
    pub poll: PollPolicy,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub release: Arc<Release>,
    /// Jobs created and observed running, in publish order.
    pub jobs: Vec<JobId>,
}

pub struct Publisher {
    source: SchedulerSource,
    options: PublishOptions,
}

impl Publisher {
    pub fn new(source: SchedulerSource, options: PublishOptions) -> Self {
        Self { source, options }
    }

    /// Publisher over one shared scheduler with default options.
    pub fn shared(scheduler: Arc<dyn Scheduler>) -> Self {
        Self::new(SchedulerSource::Shared(scheduler), PublishOptions::default())
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Publish every process type of `release` and wait for it to run.
    ///
    /// Stops at the first failure. Jobs created before the failure are left
    /// running unless `teardown_on_failure` is set.
    pub async fn publish(&self, release: &Arc<Release>) -> ReleaseResult<PublishReport> {
        let Some(build) = release.build.as_ref() else {
            return Err(ReleaseError::NoBuildToPublish(release.to_string()));
        };
        let scheduler = self
            .source
            .resolve()
            .map_err(ReleaseError::SchedulerUnavailable)?;

        let mut processes: Vec<_> = build.procfile.iter().collect();
        processes.sort_by(|a, b| a.0.cmp(b.0));

        let mut created = Vec::with_capacity(processes.len());
        for (process_type, line) in processes {
            let job = JobId::new(&release.app_id, release.version, process_type);
            if let Err(err) = self
                .run_job(scheduler.as_ref(), &job, &build.image, line, &mut created)
                .await
            {
                warn!(release = %release, job = %job, error = %err, "publish failed");
                if self.options.teardown_on_failure {
                    teardown(scheduler.as_ref(), &created).await;
                }
                return Err(err);
            }
        }

        info!(release = %release, jobs = created.len(), "release published");
        Ok(PublishReport {
            release: release.clone(),
            jobs: created,
        })
    }

    async fn run_job(
        &self,
        scheduler: &dyn Scheduler,
        job: &JobId,
        image: &str,
        line: &str,
        created: &mut Vec<JobId>,
    ) -> ReleaseResult<()> {
        debug!(job = %job, %image, command = %line, "creating job");
        scheduler.create(job, image, &shell_command(line)).await?;
        created.push(job.clone());

        scheduler.start(job).await?;

        let state = self.options.poll.observe(scheduler, job).await;
        if state != JobState::Running {
            return Err(ReleaseError::JobFlapping(job.to_string()));
        }
        debug!(job = %job, "job running");
        Ok(())
    }
}

/// Best-effort stop and destroy, newest first. Failures are logged only.
async fn teardown(scheduler: &dyn Scheduler, jobs: &[JobId]) {
    for job in jobs.iter().rev() {
        if let Err(e) = scheduler.stop(job).await {
            warn!(job = %job, error = %e, "teardown: stop failed");
        }
        match scheduler.destroy(job).await {
            Ok(()) => info!(job = %job, "teardown: job destroyed"),
            Err(e) => warn!(job = %job, error = %e, "teardown: destroy failed"),
        }
    }
}
