use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use jobdeck_core::sample::sample_jobs;
use jobdeck_events::EventBus;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobdeck_server::config::ServerConfig;
use jobdeck_server::router::build_app_router;
use jobdeck_server::service::JobService;
use jobdeck_server::state::AppState;
use jobdeck_server::{background, ws};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobdeck_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env()?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let cancel = CancellationToken::new();
    let task_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Job service ---
    let initial = if config.seed_sample_jobs {
        sample_jobs(Utc::now())
    } else {
        Vec::new()
    };
    tracing::info!(jobs = initial.len(), "Job store initialised");
    let jobs = Arc::new(JobService::new(
        initial,
        Arc::clone(&event_bus),
        config.hub_echo_names,
    ));

    // --- WebSocket hub ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), cancel.child_token());
    let broadcaster_handle = tokio::spawn(ws::hub::run_broadcaster(
        Arc::clone(&ws_manager),
        event_bus.subscribe(),
        cancel.child_token(),
    ));

    // --- Progress simulation ---
    let simulation_handle = if config.simulation_interval_secs > 0 {
        Some(tokio::spawn(background::simulation::run(
            Arc::clone(&jobs),
            Duration::from_secs(config.simulation_interval_secs),
            cancel.child_token(),
        )))
    } else {
        tracing::info!("Progress simulation disabled");
        None
    };

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        jobs,
        ws_manager: Arc::clone(&ws_manager),
        event_bus,
    };

    // --- Router ---
    let app = build_app_router(state, &config)?;

    // --- Start server ---
    let addr = SocketAddr::new(
        config
            .host
            .parse()
            .with_context(|| format!("Invalid HOST address '{}'", config.host))?,
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    // Hub sockets keep connections open, so close them as soon as the
    // signal arrives instead of waiting for the drain.
    let shutdown_manager = Arc::clone(&ws_manager);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_manager.shutdown_all().await;
        })
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();
    if let Some(handle) = simulation_handle {
        let _ = tokio::time::timeout(task_timeout, handle).await;
    }
    let _ = tokio::time::timeout(task_timeout, broadcaster_handle).await;
    let _ = tokio::time::timeout(task_timeout, heartbeat_handle).await;
    tracing::info!("Background tasks stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
