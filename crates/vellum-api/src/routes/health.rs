use axum::Router;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, http::StatusCode};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<vellum_worker::WorkerHealth>) {
    let health = state.worker.health().await;
    let status = if health.status == vellum_common::ComponentHealth::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
