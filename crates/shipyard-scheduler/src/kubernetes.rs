//! KubernetesScheduler: jobs as bare pods.
//!
//! The orchestrator is declarative, so the imperative lifecycle is mapped
//! onto pod manifests:
//!
//! | Operation | Effect |
//! |---|---|
//! | `create` | build and remember the Pod manifest, nothing submitted |
//! | `start` | `POST` the manifest (409 is fine if the pod is this job's) |
//! | `state` | read `status.phase` |
//! | `stop` | delete the pod, keep the manifest |
//! | `destroy` | delete the pod, forget the manifest |

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{JobId, JobState};
use crate::scheduler::Scheduler;

/// Label carrying the verbatim job ID on every pod.
pub const JOB_LABEL: &str = "shipyard.io/job";

/// DNS-1123 labels are capped at 63 characters.
const MAX_NAME_LEN: usize = 63;

/// Hex digits of the job ID hash appended to every pod name.
const HASH_LEN: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KubernetesSettings {
    pub api_url: String,
    pub namespace: String,
    /// Bearer token for the API server.
    pub token: Option<String>,
    pub insecure_skip_tls_verify: bool,
    pub timeout_secs: u64,
}

impl Default for KubernetesSettings {
    fn default() -> Self {
        Self {
            api_url: "https://127.0.0.1:6443".to_string(),
            namespace: "default".to_string(),
            token: None,
            insecure_skip_tls_verify: false,
            timeout_secs: 30,
        }
    }
}

/// Turn a job ID into a valid, unique pod name.
///
/// The readable part is the job ID squeezed into `[a-z0-9-]` and cut to
/// 52 characters. That mapping is lossy (`_`, `.` and case all collapse),
/// so a hash of the verbatim job ID is always appended.
pub fn pod_name(job: &JobId) -> String {
    let id = job.to_string();
    let readable = dns_label(&id);
    let prefix: String = readable.chars().take(MAX_NAME_LEN - HASH_LEN - 1).collect();
    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    format!("{}-{}", prefix.trim_end_matches('-'), &digest[..HASH_LEN])
}

/// Lowercases, maps every character outside `[a-z0-9-]` to `-`, trims
/// leading and trailing dashes and truncates to 63 characters.
fn dns_label(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let mut name: String = mapped.trim_matches('-').chars().take(MAX_NAME_LEN).collect();
    while name.ends_with('-') {
        name.pop();
    }
    name
}

/// Pod manifest for one job.
pub fn pod_manifest(job: &JobId, artifact: &str, command: &[String]) -> Value {
    let name = pod_name(job);
    let container = match dns_label(&job.process_type) {
        label if label.is_empty() => "main".to_string(),
        label => label,
    };
    json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {
            "name": name,
            "labels": {
                (JOB_LABEL): job.to_string(),
                "shipyard.io/process-type": job.process_type,
            },
        },
        "spec": {
            "restartPolicy": "Never",
            "containers": [{
                "name": container,
                "image": artifact,
                "command": command,
            }],
        },
    })
}

/// Map a pod `status.phase` onto a job state.
pub fn phase_state(phase: &str) -> JobState {
    match phase {
        "Pending" => JobState::Pending,
        "Running" => JobState::Running,
        "Succeeded" => JobState::Succeeded,
        "Failed" => JobState::Failed,
        _ => JobState::Unknown,
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PodStatus {
    phase: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PodMetadata {
    labels: HashMap<String, String>,
}

#[derive(Deserialize)]
struct Pod {
    #[serde(default)]
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

impl Pod {
    fn belongs_to(&self, job: &JobId) -> bool {
        self.metadata.labels.get(JOB_LABEL) == Some(&job.to_string())
    }
}

/// Scheduler backed by a Kubernetes API server.
pub struct KubernetesScheduler {
    client: Client,
    pods_url: String,
    token: Option<String>,
    /// Job ID → manifest to submit on `start`.
    manifests: RwLock<HashMap<String, Value>>,
}

impl KubernetesScheduler {
    pub fn new(settings: &KubernetesSettings) -> SchedulerResult<Self> {
        if settings.namespace.is_empty() {
            return Err(SchedulerError::Config("kubernetes namespace is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.insecure_skip_tls_verify)
            .build()
            .map_err(|e| SchedulerError::Config(e.to_string()))?;
        let pods_url = format!(
            "{}/api/v1/namespaces/{}/pods",
            settings.api_url.trim_end_matches('/'),
            settings.namespace
        );
        debug!(%pods_url, "kubernetes scheduler configured");
        Ok(Self {
            client,
            pods_url,
            token: settings.token.clone(),
            manifests: RwLock::new(HashMap::new()),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn manifest(&self, job: &JobId) -> Option<Value> {
        self.manifests.read().await.get(&job.to_string()).cloned()
    }

    /// GET the job's pod. `Ok(None)` when it does not exist.
    async fn read_pod(&self, job: &JobId) -> SchedulerResult<Option<Pod>> {
        let name = pod_name(job);
        let response = self
            .authorized(self.client.get(format!("{}/{name}", self.pods_url)))
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => Ok(Some(response.json::<Pod>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            s => Err(SchedulerError::backend(format!("read pod {name}: {s}"))),
        }
    }

    /// A 409 on submit is only "already started" if the pod carries our job label.
    async fn adopt_existing(&self, job: &JobId) -> SchedulerResult<()> {
        let name = pod_name(job);
        match self.read_pod(job).await? {
            Some(pod) if pod.belongs_to(job) => {
                debug!(job = %job, pod = %name, "pod already exists");
                Ok(())
            }
            Some(pod) => Err(SchedulerError::backend(format!(
                "pod {name} already exists for job {}",
                pod.metadata
                    .labels
                    .get(JOB_LABEL)
                    .map(String::as_str)
                    .unwrap_or("<unlabelled>")
            ))),
            None => Err(SchedulerError::backend(format!(
                "pod {name} reported as existing but could not be read"
            ))),
        }
    }

    async fn delete_pod(&self, job: &JobId) -> SchedulerResult<()> {
        let name = pod_name(job);
        let response = self
            .authorized(self.client.delete(format!("{}/{name}", self.pods_url)))
            .send()
            .await?;
        match response.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => {
                debug!(job = %job, pod = %name, "pod deleted");
                Ok(())
            }
            s => Err(SchedulerError::backend(format!("delete pod {name}: {s}"))),
        }
    }
}

#[async_trait]
impl Scheduler for KubernetesScheduler {
    async fn create(&self, job: &JobId, artifact: &str, command: &[String]) -> SchedulerResult<()> {
        let manifest = pod_manifest(job, artifact, command);
        debug!(job = %job, pod = %pod_name(job), "pod manifest prepared");
        self.manifests.write().await.insert(job.to_string(), manifest);
        Ok(())
    }

    async fn start(&self, job: &JobId) -> SchedulerResult<()> {
        let manifest = self
            .manifest(job)
            .await
            .ok_or_else(|| SchedulerError::JobNotFound(job.to_string()))?;

        let response = self
            .authorized(self.client.post(&self.pods_url))
            .json(&manifest)
            .send()
            .await?;
        match response.status() {
            s if s.is_success() => {
                info!(job = %job, pod = %pod_name(job), "pod submitted");
                Ok(())
            }
            StatusCode::CONFLICT => self.adopt_existing(job).await,
            s => {
                let text = response.text().await.unwrap_or_default();
                Err(SchedulerError::backend(format!(
                    "submit pod {}: {s}: {}",
                    pod_name(job),
                    text.trim()
                )))
            }
        }
    }

    async fn state(&self, job: &JobId) -> JobState {
        if self.manifest(job).await.is_none() {
            error!(job = %job, "job ID does not exist");
            return JobState::Unknown;
        }
        match self.read_pod(job).await {
            Ok(Some(pod)) if pod.belongs_to(job) => phase_state(&pod.status.phase),
            Ok(Some(_)) => {
                warn!(job = %job, pod = %pod_name(job), "pod belongs to another job");
                JobState::Unknown
            }
            // Created but not yet started.
            Ok(None) => JobState::Pending,
            Err(e) => {
                error!(job = %job, error = %e, "pod read failed");
                JobState::Unknown
            }
        }
    }

    async fn stop(&self, job: &JobId) -> SchedulerResult<()> {
        if self.manifest(job).await.is_none() {
            return Ok(());
        }
        self.delete_pod(job).await
    }

    async fn destroy(&self, job: &JobId) -> SchedulerResult<()> {
        if self.manifest(job).await.is_none() {
            return Ok(());
        }
        self.delete_pod(job).await?;
        self.manifests.write().await.remove(&job.to_string());
        info!(job = %job, "pod destroyed");
        Ok(())
    }
}
