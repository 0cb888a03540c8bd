/**
 * API REST LINKWATCH - status and control surface of the watcher
 *
 * ROUTES :
 * - GET    /health          uptime, counters, MQTT state (always open)
 * - GET    /hosts           scores of every watched host
 * - GET    /hosts/{name}    one host
 * - PUT    /hosts/{name}    register / reset, body {"address": "..."}
 * - DELETE /hosts/{name}    deregister
 * - POST   /watch/start, /watch/stop
 * - GET    /suppressed      hosts whose feed is currently switched off
 *
 * SECURITY : when an API key is configured, every route except /health needs
 * a matching x-api-key header.
 */

use crate::health::{HealthTracker, ServiceHealth};
use crate::hysteresis::HysteresisPolicy;
use crate::models::HostScoreState;
use crate::state::Shared;
use crate::watcher::Watcher;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub watcher: Watcher,
    pub policy: Shared<HysteresisPolicy>,
    pub health: HealthTracker,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HostAddress {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WatchingView {
    pub watching: bool,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/hosts", get(list_hosts))
        .route(
            "/hosts/{name}",
            get(get_host).put(put_host).delete(delete_host),
        )
        .route("/watch/start", post(start_watching))
        .route("/watch/stop", post(stop_watching))
        .route("/suppressed", get(list_suppressed))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

async fn require_api_key(
    State(app): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };
    if req.uri().path().starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !ok {
        warn!("Rejected {} {}: bad or missing API key", req.method(), req.uri().path());
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

// GET /health
async fn get_health(State(app): State<AppState>) -> Json<ServiceHealth> {
    Json(app.health.get_health(&app.watcher, &app.policy))
}

// GET /hosts
async fn list_hosts(State(app): State<AppState>) -> Json<Vec<HostScoreState>> {
    Json(app.watcher.hosts())
}

// GET /hosts/{name}
async fn get_host(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<HostScoreState>, StatusCode> {
    app.watcher
        .try_score(&name)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

// PUT /hosts/{name}
async fn put_host(
    State(app): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<HostAddress>,
) -> Result<Json<HostScoreState>, StatusCode> {
    let address = body.address.trim();
    if address.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    app.watcher.add_host(&name, address);
    Ok(Json(app.watcher.score(&name)))
}

// DELETE /hosts/{name}
async fn delete_host(State(app): State<AppState>, Path(name): Path<String>) -> StatusCode {
    if app.watcher.remove_host(&name) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

// POST /watch/start
async fn start_watching(State(app): State<AppState>) -> Json<WatchingView> {
    app.watcher.start_watching();
    Json(WatchingView {
        watching: app.watcher.is_watching(),
    })
}

// POST /watch/stop
async fn stop_watching(State(app): State<AppState>) -> Json<WatchingView> {
    app.watcher.stop_watching();
    Json(WatchingView {
        watching: app.watcher.is_watching(),
    })
}

// GET /suppressed
async fn list_suppressed(State(app): State<AppState>) -> Json<Vec<String>> {
    Json(app.policy.lock().suppressed())
}
