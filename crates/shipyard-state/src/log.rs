//! Per-app log sinks.
//!
//! An app log records control-plane events for one app ("released
//! acme_v3"). Storage and streaming are left to the sink; the core only
//! opens a log when an app is created, writes messages to it and hands
//! its contents back on request.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::error::{StateError, StateResult};
use crate::types::epoch_secs;

/// Destination for app log messages.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Prepare the log for a newly created app. Failing here aborts app creation.
    async fn open(&self, app_id: &str) -> StateResult<()>;

    /// Record a message. Write failures are reported by the sink itself.
    async fn write(&self, app_id: &str, message: &str);

    /// The log contents so far, or `None` if this sink keeps nothing readable.
    async fn read(&self, _app_id: &str) -> StateResult<Option<String>> {
        Ok(None)
    }
}

/// Emits app messages as `tracing` events with an `app` field.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn open(&self, _app_id: &str) -> StateResult<()> {
        Ok(())
    }

    async fn write(&self, app_id: &str, message: &str) {
        info!(app = %app_id, "{}", message.trim());
    }
}

/// Appends app messages to `<dir>/<app_id>.log`.
#[derive(Debug, Clone)]
pub struct FileLogSink {
    dir: PathBuf,
}

impl FileLogSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Callers pass validated app IDs; see [`crate::names::validate`].
    pub fn path_for(&self, app_id: &str) -> PathBuf {
        self.dir.join(format!("{app_id}.log"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sink_error(app_id: &str, e: std::io::Error) -> StateError {
        StateError::LogSink {
            app: app_id.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl LogSink for FileLogSink {
    /// Create (or truncate) the app's log file.
    async fn open(&self, app_id: &str) -> StateResult<()> {
        fs::File::create(self.path_for(app_id))
            .await
            .map_err(|e| Self::sink_error(app_id, e))?;
        Ok(())
    }

    async fn write(&self, app_id: &str, message: &str) {
        let path = self.path_for(app_id);
        let line = format!("{} shipyard[api]: {}\n", epoch_secs(), message.trim());
        if let Err(e) = append_line(&path, &line).await {
            error!(app = %app_id, ?path, error = %e, "could not write app log");
        }
        info!(app = %app_id, "{}", message.trim());
    }

    async fn read(&self, app_id: &str) -> StateResult<Option<String>> {
        match fs::read_to_string(self.path_for(app_id)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::sink_error(app_id, e)),
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_sink_truncates_on_open_and_appends_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());

        std::fs::write(sink.path_for("acme"), "stale\n").unwrap();
        sink.open("acme").await.unwrap();
        assert_eq!(sink.read("acme").await.unwrap().as_deref(), Some(""));

        sink.write("acme", "released acme_v1\n").await;
        sink.write("acme", "released acme_v2").await;

        let contents = sink.read("acme").await.unwrap().unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("shipyard[api]: released acme_v1"));
        assert!(lines[1].ends_with("shipyard[api]: released acme_v2"));
    }

    #[tokio::test]
    async fn file_sink_open_fails_for_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path().join("does-not-exist"));

        let err = sink.open("acme").await.unwrap_err();
        assert!(matches!(err, StateError::LogSink { .. }));
    }

    #[tokio::test]
    async fn file_sink_read_of_unknown_app_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());
        assert_eq!(sink.read("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tracing_sink_always_opens_and_keeps_nothing() {
        assert!(TracingLogSink.open("anything").await.is_ok());
        TracingLogSink.write("anything", "hello").await;
        assert_eq!(TracingLogSink.read("anything").await.unwrap(), None);
    }
}
