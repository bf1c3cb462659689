//! App: a deployable application identity and its release ledger.
//!
//! The app is the only mutator of its ledger. Callers that share an app
//! across tasks go through an [`AppHandle`](crate::AppHandle), whose lock
//! serialises the read-latest/append sequence in [`App::new_release`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StateError, StateResult};
use crate::ledger::Ledger;
use crate::names;
use crate::types::{epoch_secs, Build, Config, Release, Version};

#[derive(Debug, Clone, Serialize)]
pub struct App {
    pub id: String,
    /// Internal identity, stable even if the app is renamed.
    #[serde(skip)]
    pub uuid: Uuid,
    /// Unix timestamp (seconds) when this app was created.
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last appended release.
    pub updated_at: u64,
    #[serde(skip)]
    ledger: Ledger,
}

impl App {
    /// Create an app with an empty ledger; the first release will be v1.
    ///
    /// An empty `id` is replaced with a generated adjective-noun name.
    /// Generated names are not checked for uniqueness.
    pub fn new(id: &str) -> Self {
        Self::with_ledger(id, Ledger::new(1))
    }

    /// Create an app seeded with an empty v0 release (no build, no config).
    pub fn with_empty_release(id: &str) -> Self {
        let mut app = Self::with_ledger(id, Ledger::new(0));
        app.ledger.append(&app.id, None, None);
        app
    }

    fn with_ledger(id: &str, ledger: Ledger) -> Self {
        let id = if id.is_empty() {
            names::generate()
        } else {
            id.to_string()
        };
        let now = epoch_secs();
        Self {
            id,
            uuid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The release with the highest version, if any.
    pub fn latest_release(&self) -> Option<Arc<Release>> {
        self.ledger.latest().cloned()
    }

    /// Append a new release.
    ///
    /// A missing build or config is inherited from the current latest
    /// release, which is how config-only and build-only releases are made.
    pub fn new_release(
        &mut self,
        build: Option<Arc<Build>>,
        config: Option<Arc<Config>>,
    ) -> Arc<Release> {
        let latest = self.ledger.latest();
        let build = build.or_else(|| latest.and_then(|r| r.build.clone()));
        let config = config.or_else(|| latest.and_then(|r| r.config.clone()));

        let release = self.ledger.append(&self.id, build, config);
        self.updated_at = release.created_at;
        debug!(app = %self.id, version = release.version, "release appended");
        release
    }

    /// Validate a rollback target and append a release replaying its
    /// build and config. Publishing the returned release is the caller's job.
    ///
    /// History is never truncated: the ledger always grows by one.
    pub fn prepare_rollback(&mut self, version: Version) -> StateResult<Arc<Release>> {
        if version < 1 {
            return Err(StateError::InvalidVersion(version));
        }
        let target = self
            .ledger
            .get(version)
            .cloned()
            .ok_or_else(|| StateError::ReleaseNotFound {
                app: self.id.clone(),
                version,
            })?;

        Ok(self.new_release(target.build.clone(), target.config.clone()))
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
