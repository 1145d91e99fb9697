//! Jobdeck server library.
//!
//! Exposes the building blocks (config, state, job service, error handling,
//! routes, WebSocket hub) so integration tests and the binary entrypoint
//! can both access them.

pub mod background;
pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod service;
pub mod state;
pub mod ws;
