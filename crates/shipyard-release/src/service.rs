//! ReleaseService: the operations a transport exposes.
//!
//! Ties the app registry to a publisher and records deploy outcomes in the
//! app's log.

use std::sync::Arc;

use serde::Serialize;
use shipyard_state::{App, AppRegistry, Build, Config, Release, Version};
use tracing::debug;

use crate::error::{ReleaseError, ReleaseResult};
use crate::publisher::{PublishReport, Publisher};
use crate::rollback;

/// Read-only view of an app.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AppSummary {
    pub id: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub latest_version: Option<Version>,
    pub releases: usize,
}

impl From<&App> for AppSummary {
    fn from(app: &App) -> Self {
        Self {
            id: app.id.clone(),
            created_at: app.created_at,
            updated_at: app.updated_at,
            latest_version: app.latest_release().map(|r| r.version),
            releases: app.ledger().len(),
        }
    }
}

/// Result of a change that produced a release.
#[derive(Debug, Clone, Serialize)]
pub struct Deployment {
    pub release: Arc<Release>,
    /// False when the release could not be published because it has no
    /// build yet.
    pub deployed: bool,
    pub jobs: Vec<String>,
}

impl Deployment {
    fn published(report: PublishReport) -> Self {
        Self {
            jobs: report.jobs.iter().map(ToString::to_string).collect(),
            release: report.release,
            deployed: true,
        }
    }
}

/// How a config update combines with the current config.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigUpdate {
    /// Overlay the new variables on the latest release's config.
    #[default]
    Merge,
    /// Use the new config as-is.
    Replace,
}

#[derive(Clone)]
pub struct ReleaseService {
    registry: AppRegistry,
    publisher: Arc<Publisher>,
}

impl ReleaseService {
    pub fn new(registry: AppRegistry, publisher: Arc<Publisher>) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    pub fn registry(&self) -> &AppRegistry {
        &self.registry
    }

    // ── Apps ───────────────────────────────────────────────────────

    pub async fn create_app(&self, id: Option<&str>) -> ReleaseResult<AppSummary> {
        let handle = self.registry.create_app(id).await?;
        let app = handle.lock().await;
        Ok(AppSummary::from(&*app))
    }

    pub async fn get_app(&self, id: &str) -> ReleaseResult<AppSummary> {
        let handle = self.registry.get(id).await?;
        let app = handle.lock().await;
        Ok(AppSummary::from(&*app))
    }

    /// All apps, ordered by ID.
    pub async fn list_apps(&self) -> ReleaseResult<Vec<AppSummary>> {
        let mut summaries = Vec::new();
        for handle in self.registry.list().await? {
            summaries.push(AppSummary::from(&*handle.lock().await));
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    pub async fn delete_app(&self, id: &str) -> ReleaseResult<bool> {
        Ok(self.registry.delete_app(id).await?)
    }

    /// The app's ledger, oldest first.
    pub async fn releases(&self, app_id: &str) -> ReleaseResult<Vec<Arc<Release>>> {
        let handle = self.registry.get(app_id).await?;
        let app = handle.lock().await;
        Ok(app.ledger().iter().cloned().collect())
    }

    /// Every distinct build the app has released, oldest first.
    ///
    /// Config-only releases and rollbacks share their build with an earlier
    /// release; those appear once.
    pub async fn builds(&self, app_id: &str) -> ReleaseResult<Vec<Arc<Build>>> {
        let handle = self.registry.get(app_id).await?;
        let app = handle.lock().await;
        let mut builds: Vec<Arc<Build>> = Vec::new();
        for build in app.ledger().iter().filter_map(|r| r.build.as_ref()) {
            if !builds.iter().any(|seen| Arc::ptr_eq(seen, build)) {
                builds.push(build.clone());
            }
        }
        Ok(builds)
    }

    /// The app's log, `None` when the configured sink keeps nothing readable.
    pub async fn logs(&self, app_id: &str) -> ReleaseResult<Option<String>> {
        Ok(self.registry.read_log(app_id).await?)
    }

    // ── Deploys ────────────────────────────────────────────────────

    /// Release a new build (config inherited) and publish it.
    pub async fn deploy_build(&self, app_id: &str, build: Build) -> ReleaseResult<Deployment> {
        let handle = self.registry.get(app_id).await?;
        let release = handle
            .lock()
            .await
            .new_release(Some(Arc::new(build)), None);
        self.publish_logged(&release).await.map(Deployment::published)
    }

    /// Release a new config (build inherited) and publish it.
    ///
    /// An app without a build gets the release but no deployment; that is
    /// reported as `deployed: false`, not as an error.
    pub async fn update_config(
        &self,
        app_id: &str,
        config: Config,
        mode: ConfigUpdate,
    ) -> ReleaseResult<Deployment> {
        let handle = self.registry.get(app_id).await?;
        let release = {
            let mut app = handle.lock().await;
            let config = match (mode, app.latest_release().and_then(|r| r.config.clone())) {
                (ConfigUpdate::Merge, Some(base)) => config.merged_over(&base),
                _ => config,
            };
            app.new_release(None, Some(Arc::new(config)))
        };

        match self.publish_logged(&release).await {
            Ok(report) => Ok(Deployment::published(report)),
            Err(ReleaseError::NoBuildToPublish(_)) => {
                debug!(app = %app_id, release = %release, "config stored, nothing to deploy yet");
                Ok(Deployment {
                    release,
                    deployed: false,
                    jobs: Vec::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn rollback(&self, app_id: &str, version: Version) -> ReleaseResult<Deployment> {
        let handle = self.registry.get(app_id).await?;
        let report = rollback::rollback(&handle, version, &self.publisher).await;
        match &report {
            Ok(r) => {
                self.registry
                    .log(app_id, &format!("rolled back to v{version} as {}", r.release))
                    .await
            }
            Err(e) if e.deployment_attempted() => {
                self.registry
                    .log(app_id, &format!("rollback to v{version} failed: {e}"))
                    .await
            }
            Err(_) => {}
        }
        report.map(Deployment::published)
    }

    async fn publish_logged(&self, release: &Arc<Release>) -> ReleaseResult<PublishReport> {
        let result = self.publisher.publish(release).await;
        match &result {
            Ok(_) => {
                self.registry
                    .log(&release.app_id, &format!("released {release}"))
                    .await
            }
            Err(e) if e.deployment_attempted() => {
                self.registry
                    .log(&release.app_id, &format!("release {release} failed: {e}"))
                    .await
            }
            Err(_) => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use shipyard_scheduler::{JobState, MockScheduler};
    use shipyard_state::{FileLogSink, MemoryAppStore, StateError};

    fn service(mock: &MockScheduler) -> ReleaseService {
        ReleaseService::new(
            AppRegistry::in_memory(),
            Arc::new(Publisher::shared(Arc::new(mock.clone()))),
        )
    }

    fn web_build(image: &str) -> Build {
        Build::new(image).with_process("web", "run-web")
    }

    #[tokio::test]
    async fn deploy_build_publishes() {
        let mock = MockScheduler::default();
        let svc = service(&mock);
        svc.create_app(Some("acme")).await.unwrap();

        let deployment = svc.deploy_build("acme", web_build("acme/web")).await.unwrap();
        assert!(deployment.deployed);
        assert_eq!(deployment.release.version, 1);
        assert_eq!(deployment.jobs, vec!["acme_v1.web.1"]);
    }

    #[tokio::test]
    async fn config_only_update_is_not_deployed() {
        let mock = MockScheduler::default();
        let svc = service(&mock);
        svc.create_app(Some("acme")).await.unwrap();

        let deployment = svc
            .update_config("acme", Config::new([("A", "1")]), ConfigUpdate::Merge)
            .await
            .unwrap();
        assert!(!deployment.deployed);
        assert_eq!(deployment.release.version, 1);
        assert!(mock.calls().await.is_empty());
    }

    #[tokio::test]
    async fn config_merge_and_replace() {
        let mock = MockScheduler::default();
        let svc = service(&mock);
        svc.create_app(Some("acme")).await.unwrap();
        svc.deploy_build("acme", web_build("acme/web")).await.unwrap();

        svc.update_config("acme", Config::new([("A", "1")]), ConfigUpdate::Merge)
            .await
            .unwrap();
        let merged = svc
            .update_config("acme", Config::new([("B", "2")]), ConfigUpdate::Merge)
            .await
            .unwrap();
        assert!(merged.deployed);
        assert_eq!(merged.release.version, 3);

        let releases = svc.releases("acme").await.unwrap();
        let latest = releases.last().unwrap().config.clone().unwrap();
        assert_eq!(latest.get("A"), Some("1"));
        assert_eq!(latest.get("B"), Some("2"));

        let replaced = svc
            .update_config("acme", Config::new([("C", "3")]), ConfigUpdate::Replace)
            .await
            .unwrap();
        let config = replaced.release.config.clone().unwrap();
        assert_eq!(config.get("A"), None);
        assert_eq!(config.get("C"), Some("3"));
        assert_eq!(replaced.release.build.as_ref().unwrap().image, "acme/web");
    }

    #[tokio::test]
    async fn rollback_through_service() {
        let mock = MockScheduler::default();
        let svc = service(&mock);
        svc.create_app(Some("acme")).await.unwrap();
        svc.deploy_build("acme", web_build("acme/web:1")).await.unwrap();
        svc.deploy_build("acme", web_build("acme/web:2")).await.unwrap();

        let deployment = svc.rollback("acme", 1).await.unwrap();
        assert_eq!(deployment.release.version, 3);
        assert_eq!(deployment.release.build.as_ref().unwrap().image, "acme/web:1");
        assert_eq!(svc.get_app("acme").await.unwrap().latest_version, Some(3));
    }

    #[tokio::test]
    async fn unknown_app_is_not_found() {
        let svc = service(&MockScheduler::default());
        let err = svc.deploy_build("ghost", web_build("x")).await.unwrap_err();
        assert!(matches!(err, ReleaseError::State(StateError::AppNotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn duplicate_app_is_conflict() {
        let svc = service(&MockScheduler::default());
        svc.create_app(Some("acme")).await.unwrap();
        let err = svc.create_app(Some("acme")).await.unwrap_err();
        assert!(matches!(err, ReleaseError::State(StateError::NamingConflict(_))));
    }

    #[tokio::test]
    async fn list_is_sorted_and_delete_removes() {
        let svc = service(&MockScheduler::default());
        svc.create_app(Some("zeta")).await.unwrap();
        svc.create_app(Some("alpha")).await.unwrap();

        let ids: Vec<_> = svc.list_apps().await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);

        assert!(svc.delete_app("alpha").await.unwrap());
        assert!(!svc.delete_app("alpha").await.unwrap());
        assert_eq!(svc.list_apps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn builds_are_listed_once_each() {
        let svc = service(&MockScheduler::default());
        svc.create_app(Some("acme")).await.unwrap();
        assert!(svc.builds("acme").await.unwrap().is_empty());

        svc.deploy_build("acme", web_build("acme/web:1")).await.unwrap();
        svc.update_config("acme", Config::new([("A", "1")]), ConfigUpdate::Merge)
            .await
            .unwrap();
        svc.deploy_build("acme", web_build("acme/web:2")).await.unwrap();
        svc.rollback("acme", 1).await.unwrap();

        let images: Vec<_> = svc
            .builds("acme")
            .await
            .unwrap()
            .iter()
            .map(|b| b.image.clone())
            .collect();
        assert_eq!(images, vec!["acme/web:1", "acme/web:2"]);
        assert!(matches!(
            svc.builds("ghost").await,
            Err(ReleaseError::State(StateError::AppNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn outcomes_are_written_to_app_log() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileLogSink::new(dir.path());
        let path = sink.path_for("acme");
        let registry = AppRegistry::new(Arc::new(MemoryAppStore::new()), Arc::new(sink));
        let mock = MockScheduler::with_state(JobState::Running);
        let svc = ReleaseService::new(registry, Arc::new(Publisher::shared(Arc::new(mock))));

        svc.create_app(Some("acme")).await.unwrap();
        svc.deploy_build("acme", web_build("acme/web")).await.unwrap();

        let log = fs::read_to_string(path).unwrap();
        assert!(log.contains("shipyard[api]: released acme_v1"));
        assert_eq!(svc.logs("acme").await.unwrap(), Some(log));
    }
}
