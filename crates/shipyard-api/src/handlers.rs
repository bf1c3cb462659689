//! REST API handlers.
//!
//! Each handler calls into `ReleaseService` and maps its errors onto
//! HTTP statuses.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use shipyard_release::{ConfigUpdate, ReleaseError};
use shipyard_state::{Build, Config, StateError, Version};
use tracing::warn;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// HTTP status for a service error. Scheduler-side failures are 503 so a
/// client can tell "not attempted" from "attempted and failed".
fn status_for(err: &ReleaseError) -> StatusCode {
    match err {
        ReleaseError::State(state) => match state {
            StateError::AppNotFound(_) | StateError::ReleaseNotFound { .. } => StatusCode::NOT_FOUND,
            StateError::NamingConflict(_) => StatusCode::CONFLICT,
            StateError::InvalidVersion(_) | StateError::InvalidAppId(_) => StatusCode::BAD_REQUEST,
            StateError::LogSink { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        },
        ReleaseError::NoBuildToPublish(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ReleaseError::SchedulerUnavailable(_)
        | ReleaseError::JobFlapping(_)
        | ReleaseError::Scheduler(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn release_error(err: ReleaseError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        warn!(%status, error = %err, "request failed");
    }
    error_response(&err.to_string(), status).into_response()
}

/// GET /_ping
pub async fn ping() -> &'static str {
    "PONG"
}

// ── Apps ───────────────────────────────────────────────────────

/// Create app request body. Every field is optional, as is the body.
#[derive(Debug, Default, Deserialize)]
pub struct CreateAppRequest {
    #[serde(default)]
    pub id: Option<String>,
}

/// GET /apps
pub async fn list_apps(State(state): State<ApiState>) -> impl IntoResponse {
    match state.service.list_apps().await {
        Ok(apps) => ApiResponse::ok(apps).into_response(),
        Err(e) => release_error(e),
    }
}

/// POST /apps
pub async fn create_app(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        CreateAppRequest::default()
    } else {
        match serde_json::from_slice::<CreateAppRequest>(&body) {
            Ok(req) => req,
            Err(e) => {
                return error_response(&format!("could not decode request: {e}"), StatusCode::BAD_REQUEST)
                    .into_response();
            }
        }
    };

    match state.service.create_app(req.id.as_deref()).await {
        Ok(app) => (StatusCode::CREATED, ApiResponse::ok(app)).into_response(),
        Err(e) => release_error(e),
    }
}

/// GET /apps/{id}
pub async fn get_app(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.service.get_app(&id).await {
        Ok(app) => ApiResponse::ok(app).into_response(),
        Err(e) => release_error(e),
    }
}

/// DELETE /apps/{id}
pub async fn delete_app(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.service.delete_app(&id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(&format!("could not find app with id {id}"), StatusCode::NOT_FOUND)
            .into_response(),
        Err(e) => release_error(e),
    }
}

/// GET /apps/{id}/releases
pub async fn list_releases(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.service.releases(&id).await {
        Ok(releases) => ApiResponse::ok(releases).into_response(),
        Err(e) => release_error(e),
    }
}

/// GET /apps/{id}/builds
///
/// 204 when the app exists but has never been given a build.
pub async fn list_builds(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.service.builds(&id).await {
        Ok(builds) if builds.is_empty() => StatusCode::NO_CONTENT.into_response(),
        Ok(builds) => ApiResponse::ok(builds).into_response(),
        Err(e) => release_error(e),
    }
}

/// GET /apps/{id}/logs
///
/// Plain text. 404 when the daemon logs apps through tracing only.
pub async fn app_logs(State(state): State<ApiState>, Path(id): Path<String>) -> impl IntoResponse {
    match state.service.logs(&id).await {
        Ok(Some(log)) => ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], log).into_response(),
        Ok(None) => error_response(&format!("no log kept for app {id}"), StatusCode::NOT_FOUND)
            .into_response(),
        Err(e) => release_error(e),
    }
}

// ── Deploys ────────────────────────────────────────────────────

/// POST /apps/{id}/builds
pub async fn create_build(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(build): Json<Build>,
) -> impl IntoResponse {
    match state.service.deploy_build(&id, build).await {
        Ok(deployment) => (StatusCode::CREATED, ApiResponse::ok(deployment)).into_response(),
        Err(e) => release_error(e),
    }
}

/// Config update request body.
#[derive(Debug, Deserialize)]
pub struct ConfigRequest {
    #[serde(default)]
    pub environment: HashMap<String, String>,
    /// Merge over the current config (default) or replace it.
    #[serde(default = "default_merge")]
    pub merge: bool,
}

fn default_merge() -> bool {
    true
}

/// POST /apps/{id}/config
pub async fn update_config(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<ConfigRequest>,
) -> impl IntoResponse {
    let mode = if req.merge {
        ConfigUpdate::Merge
    } else {
        ConfigUpdate::Replace
    };
    let config = Config {
        environment: req.environment,
    };
    match state.service.update_config(&id, config, mode).await {
        Ok(deployment) => (StatusCode::CREATED, ApiResponse::ok(deployment)).into_response(),
        Err(e) => release_error(e),
    }
}

/// Rollback request body.
#[derive(Debug, Deserialize)]
pub struct RollbackRequest {
    pub version: Version,
}

/// POST /apps/{id}/rollback
pub async fn rollback(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<RollbackRequest>,
) -> impl IntoResponse {
    match state.service.rollback(&id, req.version).await {
        Ok(deployment) => (StatusCode::CREATED, ApiResponse::ok(deployment)).into_response(),
        Err(e) => release_error(e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use shipyard_release::{Publisher, ReleaseService};
    use shipyard_scheduler::{JobState, MockScheduler};
    use shipyard_state::AppRegistry;

    fn test_state(state: JobState) -> ApiState {
        let mock = MockScheduler::with_state(state);
        ApiState {
            service: ReleaseService::new(
                AppRegistry::in_memory(),
                Arc::new(Publisher::shared(Arc::new(mock))),
            ),
        }
    }

    fn web_build() -> Build {
        Build::new("acme/web").with_process("web", "run-web")
    }

    #[tokio::test]
    async fn create_app_without_body() {
        let state = test_state(JobState::Running);
        let resp = create_app(State(state), Bytes::new()).await.into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn create_app_with_bad_body() {
        let state = test_state(JobState::Running);
        let resp = create_app(State(state), Bytes::from_static(b"{not json"))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn duplicate_app_is_conflict() {
        let state = test_state(JobState::Running);
        let body = Bytes::from_static(br#"{"id":"acme"}"#);
        let resp = create_app(State(state.clone()), body.clone()).await.into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = create_app(State(state), body).await.into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn create_app_with_path_like_id_is_bad_request() {
        let state = test_state(JobState::Running);
        let resp = create_app(State(state.clone()), Bytes::from_static(br#"{"id":"../escaped"}"#))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.service.list_apps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn builds_of_app_without_builds_is_no_content() {
        let state = test_state(JobState::Running);
        state.service.create_app(Some("acme")).await.unwrap();

        let resp = list_builds(State(state.clone()), Path("acme".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = list_builds(State(state), Path("ghost".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logs_without_file_sink_are_not_found() {
        let state = test_state(JobState::Running);
        state.service.create_app(Some("acme")).await.unwrap();

        let resp = app_logs(State(state), Path("acme".to_string())).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_nonexistent_app() {
        let state = test_state(JobState::Running);
        let resp = get_app(State(state), Path("nope".to_string())).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_app_exists_then_missing() {
        let state = test_state(JobState::Running);
        state.service.create_app(Some("acme")).await.unwrap();

        let resp = delete_app(State(state.clone()), Path("acme".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = delete_app(State(state), Path("acme".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn build_for_missing_app_is_not_found() {
        let state = test_state(JobState::Running);
        let resp = create_build(State(state), Path("ghost".to_string()), Json(web_build()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn flapping_build_is_service_unavailable() {
        let state = test_state(JobState::Failed);
        state.service.create_app(Some("acme")).await.unwrap();

        let resp = create_build(State(state), Path("acme".to_string()), Json(web_build()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn rollback_to_zero_is_bad_request() {
        let state = test_state(JobState::Running);
        state.service.create_app(Some("acme")).await.unwrap();

        let resp = rollback(
            State(state),
            Path("acme".to_string()),
            Json(RollbackRequest { version: 0 }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn config_request_merges_by_default() {
        let req: ConfigRequest = serde_json::from_str(r#"{"environment":{"A":"1"}}"#).unwrap();
        assert!(req.merge);
        assert_eq!(req.environment["A"], "1");
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&ReleaseError::NoBuildToPublish("acme_v1".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ReleaseError::State(StateError::ReleaseNotFound {
                app: "acme".into(),
                version: 9
            })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ReleaseError::State(StateError::InvalidAppId("a/b".into()))),
            StatusCode::BAD_REQUEST
        );
    }
}
