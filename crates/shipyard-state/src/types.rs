//! Immutable deployment artifacts: builds, configs and releases.
//!
//! None of these types expose setters. A change to what is running is
//! always expressed as a new `Release` appended to the owning app's ledger.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifier of an app (human-chosen or generated).
pub type AppId = String;

/// Monotonic per-app release number.
pub type Version = u64;

// ── Build ──────────────────────────────────────────────────────────

/// A deployable artifact plus the commands for each of its process types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Build {
    /// Fully-qualified image reference, optionally tagged (`registry/repo:tag`).
    #[serde(alias = "artifact")]
    pub image: String,
    /// Process type (e.g. "web", "worker") → command line.
    #[serde(default)]
    pub procfile: HashMap<String, String>,
}

impl Build {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            procfile: HashMap::new(),
        }
    }

    /// Add a process type. Consumes and returns the build so it can be
    /// assembled before being frozen in an `Arc`.
    pub fn with_process(mut self, process_type: impl Into<String>, command: impl Into<String>) -> Self {
        self.procfile.insert(process_type.into(), command.into());
        self
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.image)
    }
}

// ── Config ─────────────────────────────────────────────────────────

/// Environment variables attached to a release.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    #[serde(default)]
    pub environment: HashMap<String, String>,
}

impl Config {
    pub fn new<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            environment: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Overlay `self` on top of `base`: keys in `self` win, keys only in
    /// `base` are kept. Neither input is modified.
    pub fn merged_over(&self, base: &Config) -> Config {
        let mut environment = base.environment.clone();
        environment.extend(
            self.environment
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Config { environment }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }
}

// ── Release ────────────────────────────────────────────────────────

/// A versioned snapshot of one build and one config for an app.
///
/// Either part may be absent: a release created before any build was pushed
/// carries no build and cannot be published.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Release {
    pub app_id: AppId,
    pub version: Version,
    pub build: Option<Arc<Build>>,
    pub config: Option<Arc<Config>>,
    /// Unix timestamp (seconds) when this release was appended.
    pub created_at: u64,
}

impl Release {
    pub(crate) fn new(
        app_id: &str,
        version: Version,
        build: Option<Arc<Build>>,
        config: Option<Arc<Config>>,
    ) -> Self {
        Self {
            app_id: app_id.to_string(),
            version,
            build,
            config,
            created_at: epoch_secs(),
        }
    }

    /// Whether this release references the same build and config objects
    /// as `other` (not merely equal values).
    pub fn shares_artifacts_with(&self, other: &Release) -> bool {
        fn same<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
            match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            }
        }
        same(&self.build, &other.build) && same(&self.config, &other.config)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_v{}", self.app_id, self.version)
    }
}

/// Current Unix epoch in seconds.
pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_new_keys() {
        let base = Config::new([("A", "1")]);
        let merged = Config::new([("B", "2")]).merged_over(&base);

        assert_eq!(merged, Config::new([("A", "1"), ("B", "2")]));
    }

    #[test]
    fn merge_overwrites_existing_keys() {
        let base = Config::new([("A", "1")]);
        let merged = Config::new([("A", "3")]).merged_over(&base);

        assert_eq!(merged.environment.len(), 1);
        assert_eq!(merged.get("A"), Some("3"));
    }

    #[test]
    fn merge_leaves_inputs_untouched() {
        let base = Config::new([("A", "1")]);
        let overlay = Config::new([("A", "2")]);
        let _ = overlay.merged_over(&base);

        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(overlay.get("A"), Some("2"));
    }

    #[test]
    fn release_display_is_app_and_version() {
        let release = Release::new("acme", 7, None, None);
        assert_eq!(release.to_string(), "acme_v7");
    }

    #[test]
    fn build_display_is_image() {
        let build = Build::new("quay.io/acme/web:1.2").with_process("web", "run-web");
        assert_eq!(build.to_string(), "quay.io/acme/web:1.2");
        assert_eq!(build.procfile["web"], "run-web");
    }

    #[test]
    fn shared_artifacts_are_pointer_equal() {
        let build = Arc::new(Build::new("acme/web"));
        let a = Release::new("acme", 1, Some(build.clone()), None);
        let b = Release::new("acme", 2, Some(build), None);
        let c = Release::new("acme", 3, Some(Arc::new(Build::new("acme/web"))), None);

        assert!(a.shares_artifacts_with(&b));
        assert!(!a.shares_artifacts_with(&c));
    }

    #[test]
    fn release_serializes_with_inline_build() {
        let build = Arc::new(Build::new("acme/web").with_process("web", "run-web"));
        let release = Release::new("acme", 1, Some(build), None);
        let json = serde_json::to_value(&release).unwrap();

        assert_eq!(json["version"], 1);
        assert_eq!(json["build"]["image"], "acme/web");
        assert!(json["config"].is_null());
    }
}
