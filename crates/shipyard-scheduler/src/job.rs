//! Job identifiers and observed job states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Replica index used for every job; horizontal scaling is not supported.
pub const DEFAULT_REPLICA: u32 = 1;

/// Deterministic name of one process type of one release.
///
/// Renders as `<app>_v<version>.<process type>.<replica>`, e.g.
/// `acme_v3.web.1`. Backends use this string verbatim where they can,
/// so external tooling may match on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId {
    pub app: String,
    pub version: u64,
    pub process_type: String,
    pub replica: u32,
}

impl JobId {
    pub fn new(app: &str, version: u64, process_type: &str) -> Self {
        Self {
            app: app.to_string(),
            version,
            process_type: process_type.to_string(),
            replica: DEFAULT_REPLICA,
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_v{}.{}.{}",
            self.app, self.version, self.process_type, self.replica
        )
    }
}

/// Backend-observed run state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl JobState {
    /// Whether the job has stopped for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Wrap a Procfile command line so it runs under a shell.
pub fn shell_command(line: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), line.to_string()]
}
