//! One step of the demo progress simulation.
//!
//! Each step picks a random job and moves it along: Running jobs gain
//! progress (completing at 100), queued jobs start, and completed jobs are
//! occasionally recycled to Pending so the demo never runs dry. Driven by
//! the server's background task and the client's mock transport.

use std::ops::Range;

use rand::Rng;

use crate::job::{Job, SyncUpdate};
use crate::status::JobStatus;
use crate::store::JobStore;
use crate::types::Timestamp;

/// Knobs for [`simulate_step`].
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Progress added to a Running job per step (half-open).
    pub increment: Range<i16>,
    /// Chance that a picked Completed job is reset to Pending.
    pub reset_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            increment: 5..15,
            reset_probability: 0.2,
        }
    }
}

/// What a simulation step changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// One job's status/progress moved; worth a delta.
    Progressed(Job),
    /// A completed job was recycled; worth a full listing.
    Reset(Job),
}

impl SimulationOutcome {
    pub fn job(&self) -> &Job {
        match self {
            SimulationOutcome::Progressed(job) | SimulationOutcome::Reset(job) => job,
        }
    }

    pub fn to_update(&self, echo_name: bool) -> SyncUpdate {
        SyncUpdate::from_job(self.job(), echo_name)
    }
}

/// Run one step against `store`. Returns `None` when the picked job was not
/// touched (or the store is empty).
pub fn simulate_step<R: Rng>(
    store: &mut JobStore,
    rng: &mut R,
    config: &SimulationConfig,
    now: Timestamp,
) -> Option<SimulationOutcome> {
    if store.is_empty() {
        return None;
    }
    let (id, status) = {
        let picked = &store.list()[rng.random_range(0..store.len())];
        (picked.id.clone(), picked.status)
    };

    match status {
        JobStatus::Running => {
            let increment = if config.increment.is_empty() {
                config.increment.start
            } else {
                rng.random_range(config.increment.clone())
            };
            store
                .tick(&id, increment, now)
                .ok()
                .map(SimulationOutcome::Progressed)
        }
        JobStatus::InQueue => store
            .start(&id, now)
            .ok()
            .map(SimulationOutcome::Progressed),
        JobStatus::Completed if rng.random_bool(config.reset_probability.clamp(0.0, 1.0)) => {
            store.recycle(&id).ok().map(SimulationOutcome::Reset)
        }
        _ => None,
    }
}
