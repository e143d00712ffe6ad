//! `GET /jobs/:job_id` — the job inspection endpoint. The sole channel for
//! surfacing pipeline-side failures; retryable failures are never visible
//! here except as a transient `retryable` state.

use axum::Router;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;
use vellum_data::{Job, LastError};

use crate::error::Result;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/jobs/{job_id}", get(get_job))
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub stage: &'static str,
    pub state: &'static str,
    pub retry_count: i32,
    pub progress: std::collections::HashMap<&'static str, i32>,
    pub last_error: Option<LastError>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            job_id: job.job_id,
            document_id: job.document_id,
            stage: job.stage.as_str(),
            state: job.state.as_str(),
            retry_count: job.retry_count,
            progress: job.progress(),
            last_error: job.last_error.clone(),
            updated_at: job.updated_at,
        }
    }
}

async fn get_job(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<Json<JobView>> {
    let job = state.repo.get_job(job_id).await?;
    Ok(Json(job.into()))
}
