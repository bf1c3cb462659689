//! shipyard-release: publishing releases and rolling them back.
//!
//! This crate sits between the domain model (`shipyard-state`) and the
//! execution backends (`shipyard-scheduler`):
//!
//! ```text
//!  transport ──► ReleaseService ──► AppRegistry (ledger append, per-app lock)
//!                      │
//!                      └──────────► Publisher ──► Scheduler (create/start/state)
//! ```
//!
//! # Components
//!
//! - **`publisher`**: publish a release, one job per process type
//! - **`poll`**: how long to wait for a started job to run
//! - **`rollback`**: replay an earlier release and publish it
//! - **`service`**: app and deploy operations for transports

pub mod error;
pub mod poll;
pub mod publisher;
pub mod rollback;
pub mod service;

pub use error::{ReleaseError, ReleaseResult};
pub use poll::PollPolicy;
pub use publisher::{PublishOptions, PublishReport, Publisher, SchedulerSource};
pub use rollback::rollback;
pub use service::{AppSummary, ConfigUpdate, Deployment, ReleaseService};
