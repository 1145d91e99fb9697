//! Route definitions for the `/jobs` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                    -> list_jobs
/// POST   /                    -> create_job
/// GET    /{id}                -> get_job
/// DELETE /{id}                -> delete_job
/// POST   /{id}/stop           -> stop_job
/// POST   /{id}/restart        -> restart_job
/// DELETE /status/{status}     -> delete_jobs_by_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs).post(jobs::create_job))
        .route("/{id}", get(jobs::get_job).delete(jobs::delete_job))
        .route("/{id}/stop", post(jobs::stop_job))
        .route("/{id}/restart", post(jobs::restart_job))
        .route("/status/{status}", delete(jobs::delete_jobs_by_status))
}
