//! shipyard-api: REST API for Shipyard.
//!
//! Thin axum layer over [`ReleaseService`]. Responses use the
//! `{success, data, error}` envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/_ping` | Liveness, answers `PONG` |
//! | GET | `/apps` | List apps |
//! | POST | `/apps` | Create an app, `{"id": ..}` optional |
//! | GET | `/apps/{id}` | App summary |
//! | DELETE | `/apps/{id}` | Delete an app and its releases |
//! | GET | `/apps/{id}/releases` | Release ledger |
//! | GET | `/apps/{id}/builds` | Distinct builds, oldest first |
//! | POST | `/apps/{id}/builds` | Release and publish a build |
//! | GET | `/apps/{id}/logs` | App log as plain text |
//! | POST | `/apps/{id}/config` | Release a config, publish if there is a build |
//! | POST | `/apps/{id}/rollback` | Roll back to `{"version": n}` |

pub mod handlers;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use shipyard_release::ReleaseService;
use tracing::info;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: ReleaseService,
}

/// Build the complete API router.
pub fn build_router(service: ReleaseService) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/_ping", get(handlers::ping))
        .route("/apps", get(handlers::list_apps).post(handlers::create_app))
        .route("/apps/{id}", get(handlers::get_app).delete(handlers::delete_app))
        .route("/apps/{id}/releases", get(handlers::list_releases))
        .route(
            "/apps/{id}/builds",
            get(handlers::list_builds).post(handlers::create_build),
        )
        .route("/apps/{id}/logs", get(handlers::app_logs))
        .route("/apps/{id}/config", post(handlers::update_config))
        .route("/apps/{id}/rollback", post(handlers::rollback))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(req: Request, next: Next) -> Response {
    info!(method = %req.method(), uri = %req.uri(), "request");
    next.run(req).await
}
