//! DockerScheduler: jobs as containers on a Docker Engine.
//!
//! Talks HTTP/1.1 to the Engine API over a unix socket or TCP, one
//! connection per call. `create` pulls the image and creates a container
//! named after the job; the job → container ID mapping is kept in memory for
//! the lifetime of the scheduler.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::rt::TokioIo;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{JobId, JobState};
use crate::scheduler::Scheduler;

/// Engine socket used when neither the settings nor `DOCKER_HOST` name one.
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Connection settings for the Docker Engine API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DockerSettings {
    /// Engine endpoint: `unix:///path`, `tcp://host:port` or `http://host:port`.
    /// Defaults to `DOCKER_HOST`, then the standard socket.
    pub host: String,
    /// Optional API version prefix, e.g. "v1.43".
    pub api_version: Option<String>,
    /// Per-request timeout in seconds. Pulls can be slow.
    pub timeout_secs: u64,
}

impl Default for DockerSettings {
    fn default() -> Self {
        let host = std::env::var("DOCKER_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string());
        Self {
            host,
            api_version: None,
            timeout_secs: 300,
        }
    }
}

/// Where the Engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port`
    Tcp(String),
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl DockerSettings {
    pub fn endpoint(&self) -> SchedulerResult<Endpoint> {
        let host = self.host.trim();
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(SchedulerError::Config("docker host unix:// has no socket path".into()));
            }
            return Ok(Endpoint::Unix(PathBuf::from(path)));
        }
        let addr = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
            .map(|rest| rest.trim_end_matches('/'))
            .filter(|addr| !addr.is_empty() && !addr.contains('/'))
            .ok_or_else(|| {
                SchedulerError::Config(format!(
                    "docker host {host}: expected unix:///path, tcp://host:port or http://host:port"
                ))
            })?;
        Ok(Endpoint::Tcp(addr.to_string()))
    }

    /// Path prefix for every API call, `/v1.43` or empty.
    pub fn path_prefix(&self) -> String {
        match &self.api_version {
            Some(version) => format!("/{}", version.trim_matches('/')),
            None => String::new(),
        }
    }
}

/// An image reference split the way the Engine pull endpoint wants it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host when the reference names one (`quay.io` in `quay.io/acme/web`).
    pub registry: Option<String>,
    /// Repository including the registry, without tag or digest.
    pub repository: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

impl ImageRef {
    pub fn parse(artifact: &str) -> Self {
        let (name, digest) = match artifact.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (artifact, None),
        };
        let (repository, tag) = match name.rfind(':') {
            Some(i) if !name[i + 1..].contains('/') => {
                (&name[..i], Some(name[i + 1..].to_string()))
            }
            _ => (name, None),
        };
        let registry = if repository.matches('/').count() > 1 {
            repository.split_once('/').map(|(r, _)| r.to_string())
        } else {
            None
        };
        Self {
            registry,
            repository: repository.to_string(),
            tag,
            digest,
        }
    }

    /// The `tag` query value: digest, then tag, then "latest".
    pub fn pull_tag(&self) -> &str {
        self.digest
            .as_deref()
            .or(self.tag.as_deref())
            .unwrap_or("latest")
    }
}

// ── Engine API payloads ────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct CreateContainerBody<'a> {
    image: &'a str,
    cmd: &'a [String],
    labels: HashMap<&'static str, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CreateContainerResponse {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    state: ContainerState,
}

/// The `State` object of a container inspect response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    pub exit_code: i64,
}

impl ContainerState {
    pub fn job_state(&self) -> JobState {
        if self.running && !self.paused && !self.restarting {
            return JobState::Running;
        }
        if self.paused || self.restarting || self.status == "created" {
            return JobState::Pending;
        }
        match self.status.as_str() {
            "exited" if self.exit_code == 0 => JobState::Succeeded,
            // "dead": the engine could not stop or remove it, whatever the exit code.
            "exited" | "dead" => JobState::Failed,
            _ => JobState::Unknown,
        }
    }
}

#[derive(Deserialize)]
struct PullProgress {
    error: Option<String>,
}

// ── Transport ──────────────────────────────────────────────────────

/// Minimal Engine API client: one HTTP/1.1 exchange per connection.
struct Engine {
    endpoint: Endpoint,
    prefix: String,
    timeout: Duration,
}

impl Engine {
    /// Origin-form request target with the version prefix and an encoded query.
    fn target(&self, path: &str, query: &[(&str, &str)]) -> SchedulerResult<String> {
        let url = Url::parse_with_params(&format!("http://docker{}{path}", self.prefix), query)
            .map_err(|e| SchedulerError::backend(format!("invalid engine path {path}: {e}")))?;
        Ok(match url.query() {
            Some(q) if !q.is_empty() => format!("{}?{q}", url.path()),
            _ => url.path().to_string(),
        })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Vec<u8>>,
    ) -> SchedulerResult<(StatusCode, Bytes)> {
        let target = self.target(path, query)?;
        let builder = Request::builder()
            .method(method)
            .uri(target.as_str())
            .header(header::HOST, "docker");
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Full::new(Bytes::from(json))),
            None => builder.body(Full::new(Bytes::new())),
        }
        .map_err(|e| SchedulerError::backend(format!("build request {target}: {e}")))?;

        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| {
                SchedulerError::backend(format!(
                    "{target}: no answer from {} within {:?}",
                    self.endpoint, self.timeout
                ))
            })?
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> SchedulerResult<(StatusCode, Bytes)> {
        let unreachable =
            |e: std::io::Error| SchedulerError::backend(format!("docker engine at {}: {e}", self.endpoint));
        let response = match &self.endpoint {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await.map_err(unreachable)?;
                send(stream, request).await?
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path).await.map_err(unreachable)?;
                send(stream, request).await?
            }
            #[cfg(not(unix))]
            Endpoint::Unix(_) => {
                return Err(SchedulerError::Config(format!(
                    "{}: unix sockets are not available on this platform",
                    self.endpoint
                )));
            }
        };
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| SchedulerError::backend(format!("read engine response: {e}")))?
            .to_bytes();
        Ok((status, body))
    }
}

async fn send<S>(stream: S, request: Request<Full<Bytes>>) -> SchedulerResult<Response<Incoming>>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| SchedulerError::backend(format!("engine handshake: {e}")))?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "engine connection closed");
        }
    });
    sender
        .send_request(request)
        .await
        .map_err(|e| SchedulerError::backend(format!("engine request: {e}")))
}

fn decode<T: DeserializeOwned>(what: &str, body: &[u8]) -> SchedulerResult<T> {
    serde_json::from_slice(body).map_err(|e| SchedulerError::backend(format!("unreadable {what}: {e}")))
}

fn text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).trim().to_string()
}

// ── Scheduler ──────────────────────────────────────────────────────

/// Scheduler backed by a Docker Engine.
pub struct DockerScheduler {
    engine: Engine,
    /// Job ID → container ID.
    containers: RwLock<HashMap<String, String>>,
}

impl DockerScheduler {
    pub fn new(settings: &DockerSettings) -> SchedulerResult<Self> {
        let endpoint = settings.endpoint()?;
        debug!(%endpoint, "docker scheduler configured");
        Ok(Self {
            engine: Engine {
                endpoint,
                prefix: settings.path_prefix(),
                timeout: Duration::from_secs(settings.timeout_secs),
            },
            containers: RwLock::new(HashMap::new()),
        })
    }

    async fn container_id(&self, job: &JobId) -> Option<String> {
        self.containers.read().await.get(&job.to_string()).cloned()
    }

    async fn pull(&self, artifact: &str) -> SchedulerResult<()> {
        let image = ImageRef::parse(artifact);
        debug!(%artifact, registry = ?image.registry, "pulling image");

        let pull_failed = |reason: String| SchedulerError::ArtifactPullFailed {
            artifact: artifact.to_string(),
            reason,
        };
        let (status, body) = self
            .engine
            .call(
                Method::POST,
                "/images/create",
                &[("fromImage", image.repository.as_str()), ("tag", image.pull_tag())],
                None,
            )
            .await
            .map_err(|e| pull_failed(e.to_string()))?;

        if !status.is_success() {
            return Err(pull_failed(format!("{status}: {}", text(&body))));
        }
        // The engine streams progress as JSON lines and reports failures inline.
        let body = String::from_utf8_lossy(&body);
        for line in body.lines().filter(|l| !l.trim().is_empty()) {
            if let Ok(PullProgress { error: Some(reason) }) = serde_json::from_str(line) {
                return Err(pull_failed(reason));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Scheduler for DockerScheduler {
    async fn create(&self, job: &JobId, artifact: &str, command: &[String]) -> SchedulerResult<()> {
        self.pull(artifact).await?;

        let name = job.to_string();
        debug!(job = %name, "creating container");
        let payload = CreateContainerBody {
            image: artifact,
            cmd: command,
            labels: HashMap::from([("shipyard.job", name.clone())]),
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| SchedulerError::backend(format!("encode container {name}: {e}")))?;
        let (status, body) = self
            .engine
            .call(Method::POST, "/containers/create", &[("name", name.as_str())], Some(json))
            .await?;

        if !status.is_success() {
            return Err(SchedulerError::backend(format!(
                "create container {name}: {status}: {}",
                text(&body)
            )));
        }
        let created: CreateContainerResponse = decode("create response", &body)?;
        info!(job = %name, container = %created.id, "container created");
        self.containers.write().await.insert(name, created.id);
        Ok(())
    }

    async fn start(&self, job: &JobId) -> SchedulerResult<()> {
        let id = self
            .container_id(job)
            .await
            .ok_or_else(|| SchedulerError::JobNotFound(job.to_string()))?;
        debug!(job = %job, container = %id, "starting container");

        let (status, _) = self
            .engine
            .call(Method::POST, &format!("/containers/{id}/start"), &[], None)
            .await?;
        match status {
            s if s.is_success() || s == StatusCode::NOT_MODIFIED => Ok(()),
            StatusCode::NOT_FOUND => Err(SchedulerError::JobNotFound(job.to_string())),
            s => Err(SchedulerError::backend(format!("start container {id}: {s}"))),
        }
    }

    async fn state(&self, job: &JobId) -> JobState {
        let Some(id) = self.container_id(job).await else {
            error!(job = %job, "job ID does not exist");
            return JobState::Unknown;
        };

        let body = match self
            .engine
            .call(Method::GET, &format!("/containers/{id}/json"), &[], None)
            .await
        {
            Ok((status, body)) if status.is_success() => body,
            Ok((status, _)) => {
                warn!(job = %job, %status, "container inspect failed");
                return JobState::Unknown;
            }
            Err(e) => {
                error!(job = %job, error = %e, "container inspect failed");
                return JobState::Unknown;
            }
        };
        match decode::<ContainerInspect>("inspect response", &body) {
            Ok(inspect) => inspect.state.job_state(),
            Err(e) => {
                error!(job = %job, error = %e, "unreadable inspect response");
                JobState::Unknown
            }
        }
    }

    async fn stop(&self, job: &JobId) -> SchedulerResult<()> {
        let Some(id) = self.container_id(job).await else {
            return Ok(());
        };
        let (status, _) = self
            .engine
            .call(Method::POST, &format!("/containers/{id}/stop"), &[], None)
            .await?;
        match status {
            s if s.is_success() || s == StatusCode::NOT_MODIFIED || s == StatusCode::NOT_FOUND => {
                debug!(job = %job, container = %id, "container stopped");
                Ok(())
            }
            s => Err(SchedulerError::backend(format!("stop container {id}: {s}"))),
        }
    }

    async fn destroy(&self, job: &JobId) -> SchedulerResult<()> {
        let Some(id) = self.container_id(job).await else {
            return Ok(());
        };
        let (status, _) = self
            .engine
            .call(Method::DELETE, &format!("/containers/{id}"), &[("force", "true")], None)
            .await?;
        match status {
            s if s.is_success() || s == StatusCode::NOT_FOUND => {
                self.containers.write().await.remove(&job.to_string());
                info!(job = %job, container = %id, "container removed");
                Ok(())
            }
            s => Err(SchedulerError::backend(format!("remove container {id}: {s}"))),
        }
    }
}
