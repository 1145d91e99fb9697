//! In-memory transport seeded with sample jobs.
//!
//! Behaves like the server: names are validated, transitions follow the
//! same rules, and a background simulation publishes progress on an
//! [`EventBus`] in place of a push channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jobdeck_core::job::{ActionResult, Job};
use jobdeck_core::sample::sample_jobs;
use jobdeck_core::simulation::{simulate_step, SimulationConfig, SimulationOutcome};
use jobdeck_core::status::{JobPriority, JobStatus};
use jobdeck_core::store::JobStore;
use jobdeck_core::transitions::JobAction;
use jobdeck_core::validation::validate_job_name;
use jobdeck_events::{EventBus, JobEvent};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::ClientResult;
use crate::transport::TransportAdapter;

pub struct MockTransport {
    store: Mutex<JobStore>,
    latency: Duration,
    bus: Arc<EventBus>,
    echo_names: bool,
}

impl MockTransport {
    /// Seeded with the sample jobs.
    pub fn new(latency: Duration, echo_names: bool) -> Self {
        Self::with_jobs(sample_jobs(Utc::now()), latency, echo_names)
    }

    pub fn with_jobs(jobs: Vec<Job>, latency: Duration, echo_names: bool) -> Self {
        Self {
            store: Mutex::new(JobStore::from_jobs(jobs)),
            latency,
            bus: Arc::new(EventBus::default()),
            echo_names,
        }
    }

    /// Bus carrying simulated pushes.
    pub fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.bus)
    }

    /// Run one simulation step and publish what changed.
    pub async fn simulate_once(&self, config: &SimulationConfig) -> Option<JobEvent> {
        let mut store = self.store.lock().await;
        let outcome = simulate_step(&mut store, &mut rand::rng(), config, Utc::now())?;

        let event = match &outcome {
            SimulationOutcome::Progressed(job) => {
                tracing::debug!(job_id = %job.id, status = %job.status, progress = job.progress, "Simulated progress");
                JobEvent::JobProgress(outcome.to_update(self.echo_names))
            }
            SimulationOutcome::Reset(job) => {
                tracing::debug!(job_id = %job.id, "Simulated reset to pending");
                JobEvent::JobsUpdated(store.snapshot())
            }
        };
        drop(store);

        self.bus.publish(event.clone());
        Some(event)
    }

    /// Step the simulation every `interval` until cancelled. A zero
    /// interval disables the simulation.
    pub async fn run_simulation(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        if interval.is_zero() {
            tracing::info!("Mock progress simulation disabled");
            return;
        }
        tracing::info!(interval_secs = interval.as_secs(), "Mock progress simulation started");
        let config = SimulationConfig::default();
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.simulate_once(&config).await;
                }
            }
        }
        tracing::info!("Mock progress simulation stopped");
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn fetch_all(&self) -> ClientResult<Vec<Job>> {
        self.delay().await;
        Ok(self.store.lock().await.snapshot())
    }

    async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job> {
        self.delay().await;
        let name = validate_job_name(name)?;
        Ok(self.store.lock().await.create(name, priority, Utc::now()))
    }

    async fn stop(&self, id: &str) -> ClientResult<ActionResult> {
        self.delay().await;
        self.store.lock().await.apply_transition(id, JobAction::Stop)?;
        Ok(ActionResult::ok(JobAction::Stop.success_message()))
    }

    async fn restart(&self, id: &str) -> ClientResult<ActionResult> {
        self.delay().await;
        self.store
            .lock()
            .await
            .apply_transition(id, JobAction::Restart)?;
        Ok(ActionResult::ok(JobAction::Restart.success_message()))
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        self.delay().await;
        self.store
            .lock()
            .await
            .apply_transition(id, JobAction::Delete)?;
        Ok(())
    }

    async fn delete_by_status(&self, status: JobStatus) -> ClientResult<usize> {
        self.delay().await;
        Ok(self.store.lock().await.delete_by_status(status)?)
    }
}
