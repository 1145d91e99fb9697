pub mod health;
pub mod jobs;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /hub                                 WebSocket hub
///
/// /jobs                                list, create
/// /jobs/{id}                           get, delete
/// /jobs/{id}/stop                      stop (POST)
/// /jobs/{id}/restart                   restart (POST)
/// /jobs/status/{status}                bulk delete (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/hub", get(ws::hub_handler))
        .nest("/jobs", jobs::router())
}
