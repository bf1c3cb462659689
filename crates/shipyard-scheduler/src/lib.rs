//! shipyard-scheduler: runs release processes on an execution backend.
//!
//! A [`Scheduler`] turns `(job id, artifact, command)` into a running
//! workload and reports its state. Every backend exposes the same five
//! operations, even when its native model is declarative:
//!
//! ```text
//! (absent) --create--> Pending --start--> Running --> Succeeded | Failed
//!                any state --(observation fails)--> Unknown
//!                any state --destroy--> (absent)
//! ```
//!
//! # Backends
//!
//! | Kind | Type | Native model |
//! |---|---|---|
//! | `docker` | [`DockerScheduler`] | imperative containers via the Engine API |
//! | `kubernetes` | [`KubernetesScheduler`] | declarative pods via the API server |
//! | `mock` | [`MockScheduler`] | in-process recording double |
//!
//! [`new_scheduler`] picks one from [`SchedulerSettings`].

pub mod docker;
pub mod error;
pub mod factory;
pub mod job;
pub mod kubernetes;
pub mod mock;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use docker::{DockerScheduler, DockerSettings};
pub use error::{SchedulerError, SchedulerResult};
pub use factory::{new_scheduler, SchedulerKind, SchedulerSettings};
pub use job::{shell_command, JobId, JobState};
pub use kubernetes::{KubernetesScheduler, KubernetesSettings};
pub use mock::{MockCall, MockScheduler, MockSettings};
pub use scheduler::Scheduler;
