pub mod health;
pub mod intake;
pub mod jobs;
pub mod response;

pub use response::{HasStatus, ResponseStatus};

use axum::Router;

use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(intake::routes())
        .merge(jobs::routes())
        .with_state(state)
}
