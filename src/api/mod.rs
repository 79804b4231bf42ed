// Admin HTTP API: health, metrics, and match creation for the lobby.

use axum::{
    extract::{Json, MatchedPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::auth::AdminUser;
use crate::engine::game::MatchSetup;
use crate::engine::server::MatchManager;
use crate::error::SetupError;
use crate::metrics;

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub matches: Arc<MatchManager>,
}

// ── Error helper ──────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

fn setup_error_status(e: &SetupError) -> StatusCode {
    match e {
        SetupError::UnknownMap(_)
        | SetupError::UnknownChampion(_)
        | SetupError::UnknownSlot { .. }
        | SetupError::InvalidMap(_)
        | SetupError::DuplicateSlot(_)
        | SetupError::Json(_) => StatusCode::BAD_REQUEST,
        SetupError::MatchExists(_) => StatusCode::CONFLICT,
        SetupError::AtCapacity | SetupError::Io(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(matches: Arc<MatchManager>) -> Router {
    let state = AppState { matches };

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_text))
        .route("/api/matches", get(list_matches).post(create_match))
        .with_state(state)
        .layer(middleware::from_fn(track_requests))
        .layer(CorsLayer::permissive())
}

/// Counts every request by method, normalized path and status.
async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| metrics::normalize_path(req.uri().path()));
    let response = next.run(req).await;
    metrics::API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), path.as_str(), response.status().as_str()])
        .inc();
    response
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "arena-backend" }))
}

async fn metrics_text() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics::gather_metrics(),
    )
}

async fn list_matches(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!(state.matches.list()))
}

async fn create_match(
    State(state): State<AppState>,
    AdminUser(claims): AdminUser,
    Json(setup): Json<MatchSetup>,
) -> Response {
    match state.matches.create_match(setup) {
        Ok(match_id) => {
            tracing::info!(match_id = %match_id, requested_by = %claims.sub, "Match created via API");
            (StatusCode::CREATED, Json(json!({ "match_id": match_id }))).into_response()
        }
        Err(e) => {
            tracing::warn!(requested_by = %claims.sub, error = %e, "Match creation refused");
            json_error(setup_error_status(&e), &e.to_string())
        }
    }
}
