//! Periodic progress simulation.
//!
//! Every tick picks a random job: Running jobs advance (and complete at
//! 100), queued jobs start, and completed jobs are occasionally recycled
//! to Pending. Results are broadcast to hub clients through the event bus.

use std::sync::Arc;
use std::time::Duration;

use jobdeck_core::simulation::SimulationConfig;
use tokio_util::sync::CancellationToken;

use crate::service::JobService;

/// Run the simulation loop until `cancel` is triggered.
pub async fn run(jobs: Arc<JobService>, interval: Duration, cancel: CancellationToken) {
    let config = SimulationConfig::default();
    tracing::info!(
        interval_secs = interval.as_secs(),
        reset_probability = config.reset_probability,
        "Progress simulation started"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Progress simulation stopping");
                break;
            }
            _ = ticker.tick() => {
                if jobs.simulate_once(&config).await.is_none() {
                    tracing::trace!("Simulation tick changed nothing");
                }
            }
        }
    }
}
