//! shipyard-state: domain model for the Shipyard control plane.
//!
//! Holds the immutable building blocks of a deployment (`Build`, `Config`),
//! the versioned `Release` that pairs them, and the `App` that owns an
//! append-only `Ledger` of releases.
//!
//! # Architecture
//!
//! ```text
//! AppRegistry
//!   ├── AppStore (get / list / insert / remove)
//!   │     └── AppHandle = Arc<Mutex<App>>   (per-app exclusive lock)
//!   │           └── Ledger [v1, v2, v3, ...] (append-only, tail = latest)
//!   └── LogSink (per-app log: tracing or file)
//! ```
//!
//! Builds and configs are shared between releases as `Arc`s, so a
//! config-only release or a rollback points at the very same build.

pub mod app;
pub mod error;
pub mod ledger;
pub mod log;
pub mod names;
pub mod store;
pub mod types;

pub use app::App;
pub use error::{StateError, StateResult};
pub use ledger::Ledger;
pub use log::{FileLogSink, LogSink, TracingLogSink};
pub use store::{AppHandle, AppRegistry, AppStore, MemoryAppStore};
pub use types::*;
