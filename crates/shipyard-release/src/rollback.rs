//! Rollback: replay an earlier release as a new one.

use shipyard_state::{AppHandle, Version};
use tracing::info;

use crate::error::ReleaseResult;
use crate::publisher::{PublishReport, Publisher};

/// Append a release reusing the build and config of `version`, then
/// publish it.
///
/// The app lock is held only while the ledger is validated and appended
/// to. Validation errors (`InvalidVersion`, `ReleaseNotFound`) are returned
/// before any scheduler call and leave the ledger unchanged; after that the
/// outcome is whatever publishing reports.
pub async fn rollback(
    app: &AppHandle,
    version: Version,
    publisher: &Publisher,
) -> ReleaseResult<PublishReport> {
    let release = app.lock().await.prepare_rollback(version)?;
    info!(app = %release.app_id, target = version, release = %release, "rolling back");
    publisher.publish(&release).await
}
