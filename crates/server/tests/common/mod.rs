#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use jobdeck_core::sample::sample_jobs;
use jobdeck_events::EventBus;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use jobdeck_server::config::ServerConfig;
use jobdeck_server::router::build_app_router;
use jobdeck_server::service::JobService;
use jobdeck_server::state::AppState;
use jobdeck_server::ws::{self, WsManager};

/// Build a test `ServerConfig` with safe defaults.
///
/// Uses `http://localhost:5173` as CORS origin (matching the dev default)
/// and disables the progress simulation so job states stay put.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        simulation_interval_secs: 0,
        hub_echo_names: false,
        seed_sample_jobs: true,
    }
}

/// Application state seeded with the eight sample jobs.
pub fn test_state() -> AppState {
    let config = test_config();
    let event_bus = Arc::new(EventBus::default());
    let jobs = Arc::new(JobService::new(
        sample_jobs(Utc::now()),
        Arc::clone(&event_bus),
        config.hub_echo_names,
    ));

    AppState {
        config: Arc::new(config),
        jobs,
        ws_manager: Arc::new(WsManager::new()),
        event_bus,
    }
}

/// Build the full application router with all middleware layers, exactly
/// as `main.rs` does.
pub fn build_test_app() -> Router {
    build_app_router(test_state(), &test_config()).unwrap()
}

/// Serve the app on an ephemeral port with the hub broadcaster running.
/// Returns the bound address, the state (for direct mutation) and a token
/// that stops the broadcaster.
pub async fn spawn_server() -> (SocketAddr, AppState, CancellationToken) {
    let state = test_state();
    let app = build_app_router(state.clone(), &test_config()).unwrap();
    let cancel = CancellationToken::new();

    tokio::spawn(ws::hub::run_broadcaster(
        Arc::clone(&state.ws_manager),
        state.event_bus.subscribe(),
        cancel.clone(),
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state, cancel)
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
