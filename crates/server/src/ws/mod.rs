//! WebSocket hub for real-time job updates.
//!
//! Provides connection management, heartbeat monitoring, invocation
//! dispatch, event broadcasting, and the HTTP upgrade handler used by
//! Axum routes.

mod handler;
mod heartbeat;
pub mod hub;
pub mod manager;

pub use handler::hub_handler;
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
