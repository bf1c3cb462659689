//! App registry and its backing store.
//!
//! The `AppStore` trait is the seam between the control plane and wherever
//! apps are kept. `MemoryAppStore` keeps them in process. Each app is held
//! behind its own lock so release creation on one app never blocks another.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::app::App;
use crate::error::{StateError, StateResult};
use crate::log::{LogSink, TracingLogSink};
use crate::names;

/// Shared, exclusively-locked app. Hold the lock only across ledger
/// mutations, never across scheduler I/O.
pub type AppHandle = Arc<Mutex<App>>;

/// Storage for apps keyed by app ID.
#[async_trait]
pub trait AppStore: Send + Sync {
    async fn get(&self, id: &str) -> StateResult<Option<AppHandle>>;

    async fn list(&self) -> StateResult<Vec<AppHandle>>;

    /// Insert a new app. Fails with `NamingConflict` if the ID is taken.
    async fn insert(&self, id: &str, app: AppHandle) -> StateResult<()>;

    /// Remove an app and its whole ledger. Returns true if it existed.
    async fn remove(&self, id: &str) -> StateResult<bool>;
}

/// In-process app store.
#[derive(Default)]
pub struct MemoryAppStore {
    apps: RwLock<HashMap<String, AppHandle>>,
}

impl MemoryAppStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppStore for MemoryAppStore {
    async fn get(&self, id: &str) -> StateResult<Option<AppHandle>> {
        let apps = self.apps.read().await;
        Ok(apps.get(id).cloned())
    }

    async fn list(&self) -> StateResult<Vec<AppHandle>> {
        let apps = self.apps.read().await;
        Ok(apps.values().cloned().collect())
    }

    async fn insert(&self, id: &str, app: AppHandle) -> StateResult<()> {
        let mut apps = self.apps.write().await;
        if apps.contains_key(id) {
            return Err(StateError::NamingConflict(id.to_string()));
        }
        apps.insert(id.to_string(), app);
        Ok(())
    }

    async fn remove(&self, id: &str) -> StateResult<bool> {
        let mut apps = self.apps.write().await;
        Ok(apps.remove(id).is_some())
    }
}

/// Creates, looks up and deletes apps.
#[derive(Clone)]
pub struct AppRegistry {
    store: Arc<dyn AppStore>,
    log: Arc<dyn LogSink>,
    /// Seed new apps with an empty v0 release.
    seed_empty_release: bool,
}

impl AppRegistry {
    pub fn new(store: Arc<dyn AppStore>, log: Arc<dyn LogSink>) -> Self {
        Self {
            store,
            log,
            seed_empty_release: false,
        }
    }

    /// Registry over a fresh in-memory store, logging through `tracing`.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryAppStore::new()), Arc::new(TracingLogSink))
    }

    pub fn with_empty_releases(mut self, seed: bool) -> Self {
        self.seed_empty_release = seed;
        self
    }

    /// Create and register an app.
    ///
    /// With no ID (or an empty one) a name is generated; a chosen ID must
    /// pass [`names::validate`]. The app is registered before its log is
    /// opened, so a losing duplicate never touches the winner's log. If the
    /// log cannot be opened the app is removed again.
    pub async fn create_app(&self, id: Option<&str>) -> StateResult<AppHandle> {
        let id = id.unwrap_or_default();
        if !id.is_empty() {
            names::validate(id)?;
        }
        let app = if self.seed_empty_release {
            App::with_empty_release(id)
        } else {
            App::new(id)
        };
        let id = app.id.clone();

        let handle = Arc::new(Mutex::new(app));
        self.store.insert(&id, handle.clone()).await?;
        if let Err(e) = self.log.open(&id).await {
            self.store.remove(&id).await?;
            warn!(app = %id, error = %e, "app log unavailable, app not created");
            return Err(e);
        }
        info!(app = %id, "app created");
        Ok(handle)
    }

    /// Look up an app, failing with `AppNotFound` if it does not exist.
    pub async fn get(&self, id: &str) -> StateResult<AppHandle> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| StateError::AppNotFound(id.to_string()))
    }

    pub async fn list(&self) -> StateResult<Vec<AppHandle>> {
        self.store.list().await
    }

    pub async fn delete_app(&self, id: &str) -> StateResult<bool> {
        let existed = self.store.remove(id).await?;
        debug!(app = %id, existed, "app deleted");
        Ok(existed)
    }

    /// Write a message to an app's log.
    pub async fn log(&self, app_id: &str, message: &str) {
        self.log.write(app_id, message).await;
    }

    /// Read back an app's log. `None` when the sink keeps nothing readable.
    pub async fn read_log(&self, app_id: &str) -> StateResult<Option<String>> {
        self.get(app_id).await?;
        self.log.read(app_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::FileLogSink;
    use crate::types::Build;

    #[tokio::test]
    async fn create_and_get_app() {
        let registry = AppRegistry::in_memory();
        registry.create_app(Some("acme")).await.unwrap();

        let handle = registry.get("acme").await.unwrap();
        assert_eq!(handle.lock().await.id, "acme");
    }

    #[tokio::test]
    async fn create_without_id_generates_name() {
        let registry = AppRegistry::in_memory();
        let handle = registry.create_app(None).await.unwrap();
        let id = handle.lock().await.id.clone();

        assert!(!id.is_empty());
        assert!(registry.get(&id).await.is_ok());
    }

    #[tokio::test]
    async fn duplicate_id_is_a_naming_conflict() {
        let registry = AppRegistry::in_memory();
        registry.create_app(Some("acme")).await.unwrap();

        let err = registry.create_app(Some("acme")).await.unwrap_err();
        assert!(matches!(err, StateError::NamingConflict(id) if id == "acme"));
        assert_eq!(registry.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_missing_app() {
        let registry = AppRegistry::in_memory();
        let err = registry.get("nope").await.unwrap_err();
        assert!(matches!(err, StateError::AppNotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_app() {
        let registry = AppRegistry::in_memory();
        registry.create_app(Some("acme")).await.unwrap();

        assert!(registry.delete_app("acme").await.unwrap());
        assert!(!registry.delete_app("acme").await.unwrap());
        assert!(registry.get("acme").await.is_err());
    }

    #[tokio::test]
    async fn failed_log_open_leaves_no_app() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path().join("missing"));
        let registry = AppRegistry::new(Arc::new(MemoryAppStore::new()), Arc::new(sink));

        let err = registry.create_app(Some("acme")).await.unwrap_err();
        assert!(matches!(err, StateError::LogSink { .. }));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected_before_touching_the_log() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir(&logs).unwrap();
        let registry = AppRegistry::new(
            Arc::new(MemoryAppStore::new()),
            Arc::new(FileLogSink::new(&logs)),
        );

        let err = registry.create_app(Some("../escaped")).await.unwrap_err();
        assert!(matches!(err, StateError::InvalidAppId(id) if id == "../escaped"));
        assert!(!dir.path().join("escaped.log").exists());
        assert!(registry.list().await.unwrap().is_empty());

        for id in ["a/b", "Acme", "acme_web"] {
            assert!(matches!(
                registry.create_app(Some(id)).await,
                Err(StateError::InvalidAppId(_))
            ));
        }
    }

    #[tokio::test]
    async fn losing_duplicate_keeps_the_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());
        let path = sink.path_for("acme");
        let registry = AppRegistry::new(Arc::new(MemoryAppStore::new()), Arc::new(sink));

        registry.create_app(Some("acme")).await.unwrap();
        registry.log("acme", "released acme_v1").await;

        let err = registry.create_app(Some("acme")).await.unwrap_err();
        assert!(matches!(err, StateError::NamingConflict(_)));
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("released acme_v1"));
    }

    #[tokio::test]
    async fn concurrent_creates_of_one_id_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());
        let path = sink.path_for("acme");
        let registry = AppRegistry::new(Arc::new(MemoryAppStore::new()), Arc::new(sink));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let created = registry.create_app(Some("acme")).await.is_ok();
                if created {
                    registry.log("acme", "winner").await;
                }
                created
            }));
        }
        let mut winners = 0;
        for task in tasks {
            if task.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert_eq!(registry.list().await.unwrap().len(), 1);
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn read_log_of_known_and_unknown_apps() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AppRegistry::new(
            Arc::new(MemoryAppStore::new()),
            Arc::new(FileLogSink::new(dir.path())),
        );
        registry.create_app(Some("acme")).await.unwrap();
        registry.log("acme", "ohai").await;

        let log = registry.read_log("acme").await.unwrap().unwrap();
        assert!(log.contains("shipyard[api]: ohai"));
        assert!(matches!(
            registry.read_log("ghost").await,
            Err(StateError::AppNotFound(_))
        ));

        let traced = AppRegistry::in_memory();
        traced.create_app(Some("acme")).await.unwrap();
        assert_eq!(traced.read_log("acme").await.unwrap(), None);
    }

    #[tokio::test]
    async fn seeded_registry_creates_v0() {
        let registry = AppRegistry::in_memory().with_empty_releases(true);
        let handle = registry.create_app(Some("acme")).await.unwrap();

        let app = handle.lock().await;
        assert_eq!(app.latest_release().unwrap().version, 0);
    }

    #[tokio::test]
    async fn concurrent_releases_keep_versions_contiguous() {
        let registry = AppRegistry::in_memory();
        let handle = registry.create_app(Some("acme")).await.unwrap();
        let build = Arc::new(Build::new("acme/web"));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let handle = handle.clone();
            let build = build.clone();
            tasks.push(tokio::spawn(async move {
                handle.lock().await.new_release(Some(build), None).version
            }));
        }
        let mut versions = Vec::new();
        for task in tasks {
            versions.push(task.await.unwrap());
        }
        versions.sort_unstable();

        assert_eq!(versions, (1..=32).collect::<Vec<_>>());
        assert!(handle.lock().await.ledger().is_contiguous());
    }
}
