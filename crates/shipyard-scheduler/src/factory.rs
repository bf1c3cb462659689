//! Backend selection from configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::docker::{DockerScheduler, DockerSettings};
use crate::error::{SchedulerError, SchedulerResult};
use crate::kubernetes::{KubernetesScheduler, KubernetesSettings};
use crate::mock::{MockScheduler, MockSettings};
use crate::scheduler::Scheduler;

/// Which backend to run jobs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    #[default]
    Docker,
    Kubernetes,
    Mock,
}

impl FromStr for SchedulerKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "kubernetes" | "k8s" => Ok(Self::Kubernetes),
            "mock" => Ok(Self::Mock),
            _ => Err(SchedulerError::UnknownSchedulerType(s.to_string())),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Docker => "docker",
            Self::Kubernetes => "kubernetes",
            Self::Mock => "mock",
        })
    }
}

/// Scheduler section of the daemon configuration.
///
/// ```toml
/// [scheduler]
/// kind = "kubernetes"
///
/// [scheduler.kubernetes]
/// api_url = "https://10.0.0.1:6443"
/// namespace = "apps"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub kind: SchedulerKind,
    pub docker: DockerSettings,
    pub kubernetes: KubernetesSettings,
    pub mock: MockSettings,
}

impl SchedulerSettings {
    pub fn mock() -> Self {
        Self {
            kind: SchedulerKind::Mock,
            ..Default::default()
        }
    }
}

/// Build the backend named by `settings.kind`.
pub fn new_scheduler(settings: &SchedulerSettings) -> SchedulerResult<Arc<dyn Scheduler>> {
    debug!(kind = %settings.kind, "building scheduler");
    let scheduler: Arc<dyn Scheduler> = match settings.kind {
        SchedulerKind::Docker => Arc::new(DockerScheduler::new(&settings.docker)?),
        SchedulerKind::Kubernetes => Arc::new(KubernetesScheduler::new(&settings.kubernetes)?),
        SchedulerKind::Mock => Arc::new(MockScheduler::new(&settings.mock)),
    };
    Ok(scheduler)
}
