//! `POST /documents` — the intake endpoint. Validates the upload
//! announcement, performs content-hash dedup, and returns an upload target
//! for the caller to write the bytes to.
//!
//! This handler has no knowledge of how `upload_target` becomes an actual
//! place to PUT bytes (signed URL, direct proxy, etc.) — that mechanism is
//! left to the deployment.

use axum::Router;
use axum::Json;
use axum::extract::State;
use axum::routing::post;
use vellum_intake::{IntakeRequest, IntakeResponse};

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/documents", post(create_document))
}

async fn create_document(
    State(state): State<AppState>,
    Json(request): Json<IntakeRequest>,
) -> Result<Json<IntakeResponse>> {
    let response = vellum_intake::intake(
        state.repo.as_ref(),
        state.id_namespace,
        state.max_file_size_bytes,
        &request,
        chrono::Utc::now(),
    )
    .await?;
    Ok(Json(response))
}
