//! Error types for the Shipyard domain model.

use thiserror::Error;

/// Result type alias for ledger and registry operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors raised by apps, their ledgers and the app registry.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("invalid app ID {0:?}: use 1-63 lowercase letters, digits and dashes")]
    InvalidAppId(String),

    #[error("an app named {0} already exists")]
    NamingConflict(String),

    #[error("invalid release version {0}: versions start at 1")]
    InvalidVersion(u64),

    #[error("release v{version} not found for app {app}")]
    ReleaseNotFound { app: String, version: u64 },

    #[error("app not found: {0}")]
    AppNotFound(String),

    #[error("app log unavailable for {app}: {reason}")]
    LogSink { app: String, reason: String },
}
