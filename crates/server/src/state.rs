use std::sync::Arc;

use jobdeck_events::EventBus;

use crate::config::ServerConfig;
use crate::service::JobService;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The job collection and its mutation rules.
    pub jobs: Arc<JobService>,
    /// WebSocket connection manager (hub clients).
    pub ws_manager: Arc<WsManager>,
    /// Fan-out of job changes to the hub broadcaster.
    pub event_bus: Arc<EventBus>,
}
