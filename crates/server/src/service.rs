//! The authoritative job collection.
//!
//! [`JobService`] owns the server's [`JobStore`] and is the only place that
//! mutates it. REST handlers and hub invocations both call into it, and
//! every successful mutation is published on the [`EventBus`] while the
//! store lock is still held, so observers see events in mutation order.

use std::sync::Arc;

use chrono::Utc;
use jobdeck_core::error::CoreError;
use jobdeck_core::job::{ActionResult, BulkDeleteResult, CreateJob, Job, SyncUpdate};
use jobdeck_core::simulation::{simulate_step, SimulationConfig, SimulationOutcome};
use jobdeck_core::status::JobStatus;
use jobdeck_core::store::JobStore;
use jobdeck_core::transitions::{validate_bulk_delete, JobAction};
use jobdeck_core::validation::validate_job_name;
use jobdeck_events::{EventBus, JobEvent};
use tokio::sync::RwLock;

pub struct JobService {
    store: RwLock<JobStore>,
    event_bus: Arc<EventBus>,
    echo_names: bool,
}

impl JobService {
    pub fn new(jobs: Vec<Job>, event_bus: Arc<EventBus>, echo_names: bool) -> Self {
        Self {
            store: RwLock::new(JobStore::from_jobs(jobs)),
            event_bus,
            echo_names,
        }
    }

    pub async fn list(&self) -> Vec<Job> {
        self.store.read().await.snapshot()
    }

    pub async fn get(&self, id: &str) -> Result<Job, CoreError> {
        self.store
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    /// Validate and create a Pending job, then broadcast the new listing.
    pub async fn create(&self, input: CreateJob) -> Result<Job, CoreError> {
        let name = validate_job_name(&input.name)?;

        let mut store = self.store.write().await;
        let job = store.create(name, input.priority, Utc::now());
        self.event_bus.publish(JobEvent::JobsUpdated(store.snapshot()));

        tracing::info!(job_id = %job.id, name = %job.name, priority = %job.priority, "Job created");
        Ok(job)
    }

    pub async fn stop(&self, id: &str) -> Result<ActionResult, CoreError> {
        self.act(id, JobAction::Stop).await
    }

    pub async fn restart(&self, id: &str) -> Result<ActionResult, CoreError> {
        self.act(id, JobAction::Restart).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), CoreError> {
        let mut store = self.store.write().await;
        store.apply_transition(id, JobAction::Delete)?;
        self.event_bus.publish(JobEvent::JobsUpdated(store.snapshot()));

        tracing::info!(job_id = %id, "Job deleted");
        Ok(())
    }

    pub async fn delete_by_status(&self, status: JobStatus) -> Result<BulkDeleteResult, CoreError> {
        validate_bulk_delete(status)?;

        let mut store = self.store.write().await;
        let deleted = store.delete_by_status(status)?;
        if deleted > 0 {
            self.event_bus.publish(JobEvent::JobsUpdated(store.snapshot()));
        }

        tracing::info!(status = %status, deleted, "Jobs deleted by status");
        Ok(BulkDeleteResult { deleted })
    }

    /// Advance the simulation by one step and broadcast the result: a
    /// progress delta, or the full listing when a job was recycled.
    pub async fn simulate_once(&self, config: &SimulationConfig) -> Option<SimulationOutcome> {
        let mut store = self.store.write().await;
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
        self.event_bus.publish(event);
        Some(outcome)
    }

    async fn act(&self, id: &str, action: JobAction) -> Result<ActionResult, CoreError> {
        let mut store = self.store.write().await;
        let job = store.apply_transition(id, action)?;
        self.event_bus
            .publish(JobEvent::JobProgress(SyncUpdate::from_job(&job, self.echo_names)));

        tracing::info!(job_id = %id, action = %action, status = %job.status, "Job action applied");
        Ok(ActionResult::ok(action.success_message()))
    }
}
