//! How long to wait for a started job to report `Running`.

use std::time::{Duration, Instant};

use shipyard_scheduler::{JobId, JobState, Scheduler};
use tracing::debug;

/// Bounded polling of a job's state after `start`.
///
/// `single()` observes once, which is the historical behaviour: a backend
/// that reports `Pending` for a moment after start makes the publish fail.
/// `backoff(..)` keeps observing while the job is `Pending` or `Unknown`,
/// doubling the delay up to `max_delay`, until `attempts` observations have
/// been made or `deadline` has passed. Terminal states end polling at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub deadline: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::single()
    }
}

impl PollPolicy {
    /// One point-in-time observation.
    pub fn single() -> Self {
        Self {
            attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            deadline: Duration::ZERO,
        }
    }

    pub fn backoff(
        attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay,
            max_delay: max_delay.max(initial_delay),
            deadline,
        }
    }

    /// Observe `job` until it is `Running`, terminal, or the policy is
    /// exhausted. Returns the last observed state.
    pub async fn observe(&self, scheduler: &dyn Scheduler, job: &JobId) -> JobState {
        let started = Instant::now();
        let mut delay = self.initial_delay;
        let mut attempt = 1;

        loop {
            let state = scheduler.state(job).await;
            if state == JobState::Running || state.is_terminal() || attempt >= self.attempts {
                return state;
            }
            let elapsed = started.elapsed();
            if elapsed >= self.deadline {
                debug!(job = %job, %state, attempt, "poll deadline reached");
                return state;
            }

            debug!(job = %job, %state, attempt, delay_ms = delay.as_millis() as u64, "job not running yet");
            tokio::time::sleep(delay.min(self.deadline - elapsed)).await;
            delay = (delay * 2).min(self.max_delay);
            attempt += 1;
        }
    }
}
