//! Ledger: the append-only release history of one app.
//!
//! Releases are stored in insertion order, which is also version order:
//! the entry at index `i` always has version `base_version + i`. Reading
//! the latest release is a tail lookup and never reorders storage.

use std::sync::Arc;

use serde::Serialize;

use crate::types::{Build, Config, Release, Version};

#[derive(Debug, Clone, Serialize)]
pub struct Ledger {
    /// Version of the first entry (0 if the app was seeded with an empty release).
    base_version: Version,
    releases: Vec<Arc<Release>>,
}

impl Ledger {
    /// An empty ledger whose first release will be `base_version`.
    pub fn new(base_version: Version) -> Self {
        Self {
            base_version,
            releases: Vec::new(),
        }
    }

    pub fn base_version(&self) -> Version {
        self.base_version
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// The most recently appended release.
    pub fn latest(&self) -> Option<&Arc<Release>> {
        self.releases.last()
    }

    /// Version the next appended release will receive.
    pub fn next_version(&self) -> Version {
        self.latest()
            .map_or(self.base_version, |latest| latest.version + 1)
    }

    /// Look up a release by version.
    pub fn get(&self, version: Version) -> Option<&Arc<Release>> {
        let index = version.checked_sub(self.base_version)?;
        let release = self.releases.get(usize::try_from(index).ok()?)?;
        debug_assert_eq!(release.version, version);
        Some(release)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Release>> {
        self.releases.iter()
    }

    /// Append a release at the next version.
    pub(crate) fn append(
        &mut self,
        app_id: &str,
        build: Option<Arc<Build>>,
        config: Option<Arc<Config>>,
    ) -> Arc<Release> {
        let release = Arc::new(Release::new(app_id, self.next_version(), build, config));
        self.releases.push(release.clone());
        release
    }

    /// Whether every entry satisfies `entry[i].version == base_version + i`.
    pub fn is_contiguous(&self) -> bool {
        self.releases
            .iter()
            .zip(self.base_version..)
            .all(|(release, expected)| release.version == expected)
    }
}
