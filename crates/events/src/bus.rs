//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans [`JobEvent`]s out to every subscriber. The server
//! publishes on it after each mutation and the hub forwards events to
//! connected sockets; the client's mock transport publishes simulated
//! progress on it in place of a real push channel.

use jobdeck_core::job::{Job, SyncUpdate};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::messages::HubMessage;

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// A change to the job collection worth telling observers about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobEvent {
    /// The full listing after a structural change (create, delete, reset).
    JobsUpdated(Vec<Job>),
    /// One job's status/progress moved.
    JobProgress(SyncUpdate),
}

impl JobEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            JobEvent::JobsUpdated(_) => "jobs_updated",
            JobEvent::JobProgress(_) => "update_job_progress",
        }
    }
}

impl From<JobEvent> for HubMessage {
    fn from(event: JobEvent) -> Self {
        match event {
            JobEvent::JobsUpdated(jobs) => HubMessage::JobsUpdated(jobs),
            JobEvent::JobProgress(update) => HubMessage::UpdateJobProgress(update),
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use jobdeck_events::bus::{EventBus, JobEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(JobEvent::JobsUpdated(Vec::new()));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<JobEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed events are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers. Dropped silently when
    /// nobody is listening.
    pub fn publish(&self, event: JobEvent) {
        let kind = event.kind();
        // SendError only means there are zero receivers.
        let receivers = self.sender.send(event).unwrap_or(0);
        tracing::trace!(kind, receivers, "Job event published");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
