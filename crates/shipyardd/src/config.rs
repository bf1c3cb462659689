//! Daemon configuration: an optional TOML file, overridden by CLI flags.
//!
//! ```toml
//! addr = "tcp://0.0.0.0:8080"
//! log_dir = "/var/log/shipyard"
//!
//! [scheduler]
//! kind = "docker"
//!
//! [scheduler.docker]
//! host = "unix:///var/run/docker.sock"
//!
//! [publish]
//! teardown_on_failure = true
//! poll_attempts = 10
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use shipyard_release::{PollPolicy, PublishOptions};
use shipyard_scheduler::SchedulerSettings;

pub const DEFAULT_ADDR: &str = "tcp://0.0.0.0:8080";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Listen address, `tcp://host:port` or `unix:///path/to.sock`.
    pub addr: Option<String>,
    /// Directory for per-app log files. Without it app logs go to tracing.
    pub log_dir: Option<PathBuf>,
    /// Start every new app with an empty v0 release.
    pub seed_empty_release: bool,
    pub scheduler: SchedulerSettings,
    pub publish: PublishConfig,
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: DaemonConfig =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }
}

/// Publishing behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PublishConfig {
    pub teardown_on_failure: bool,
    /// Build a new scheduler for every publish instead of sharing one.
    pub scheduler_per_publish: bool,
    /// State observations after `start`; 1 means a single check.
    pub poll_attempts: u32,
    pub poll_initial_delay_ms: u64,
    pub poll_max_delay_ms: u64,
    pub poll_deadline_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            teardown_on_failure: false,
            scheduler_per_publish: false,
            poll_attempts: 1,
            poll_initial_delay_ms: 250,
            poll_max_delay_ms: 4_000,
            poll_deadline_ms: 30_000,
        }
    }
}

impl PublishConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        if self.poll_attempts <= 1 {
            return PollPolicy::single();
        }
        PollPolicy::backoff(
            self.poll_attempts,
            Duration::from_millis(self.poll_initial_delay_ms),
            Duration::from_millis(self.poll_max_delay_ms),
            Duration::from_millis(self.poll_deadline_ms),
        )
    }

    pub fn options(&self) -> PublishOptions {
        PublishOptions {
            teardown_on_failure: self.teardown_on_failure,
            poll: self.poll_policy(),
        }
    }
}

// ── Listen address ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenAddr {
    Tcp(SocketAddr),
    Unix(PathBuf),
}

impl FromStr for ListenAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (proto, rest) = s.split_once("://").unwrap_or(("tcp", s));
        match proto {
            "tcp" => {
                let addr = rest
                    .parse()
                    .with_context(|| format!("invalid tcp address {rest}"))?;
                Ok(Self::Tcp(addr))
            }
            "unix" if !rest.is_empty() => Ok(Self::Unix(PathBuf::from(rest))),
            "unix" => bail!("unix address needs a socket path"),
            other => bail!("invalid protocol format: {other}"),
        }
    }
}

impl fmt::Display for ListenAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "tcp://{addr}"),
            Self::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}
