//! Job entity, the delta update shape, and request/response DTOs.

use serde::{Deserialize, Serialize};

use crate::status::{JobPriority, JobStatus};
use crate::types::{JobId, Timestamp};

/// Upper bound of `Job::progress`.
pub const MAX_PROGRESS: i16 = 100;

/// A tracked unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    /// Percentage in `0..=100`.
    pub progress: i16,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub error_message: Option<String>,
}

impl Job {
    /// A freshly created job: Pending, 0% progress, new UUID v4 id.
    pub fn new(name: impl Into<String>, priority: JobPriority, now: Timestamp) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            status: JobStatus::Pending,
            priority,
            progress: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Re-establish the progress and completion invariants after fields
    /// were overwritten from outside (a delta, a simulation tick).
    ///
    /// Progress is clamped to `0..=100`. A Running job at 100% becomes
    /// Completed; a Completed job is pinned at 100% and gets a
    /// `completed_at` stamp if it has none. Timestamps that no longer fit
    /// the status are cleared: only Completed jobs keep `completed_at`,
    /// and Pending/InQueue jobs have no `started_at`.
    pub fn normalize(&mut self, now: Timestamp) {
        self.progress = self.progress.clamp(0, MAX_PROGRESS);

        if self.status == JobStatus::Running && self.progress >= MAX_PROGRESS {
            self.status = JobStatus::Completed;
        }

        if self.status == JobStatus::Completed {
            self.progress = MAX_PROGRESS;
            if self.completed_at.is_none() {
                self.completed_at = Some(now);
            }
        } else {
            self.completed_at = None;
        }

        if !self.status.has_started() {
            self.started_at = None;
        }
    }
}

/// Clamp an untrusted progress value into `0..=100`.
pub fn clamp_progress(value: i32) -> i16 {
    value.clamp(0, i32::from(MAX_PROGRESS)) as i16
}

/// Incremental push notification describing one job's changed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUpdate {
    pub id: JobId,
    pub status: JobStatus,
    /// Untrusted; clamped when applied.
    pub progress: i32,
    /// Only present when the sender echoes names in deltas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SyncUpdate {
    /// Build a delta from the current state of `job`.
    pub fn from_job(job: &Job, echo_name: bool) -> Self {
        Self {
            id: job.id.clone(),
            status: job.status,
            progress: i32::from(job.progress),
            name: echo_name.then(|| job.name.clone()),
        }
    }
}

/// DTO for creating a job (`POST /api/v1/jobs`, hub `CreateJob`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJob {
    pub name: String,
    #[serde(default)]
    pub priority: JobPriority,
}

/// Result of a stop/restart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Result of a bulk delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    pub deleted: usize,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn new_job_starts_pending_at_zero() {
        let job = Job::new("Nightly Backup", JobPriority::High, Utc::now());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.priority, JobPriority::High);
        assert_eq!(job.progress, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(!job.id.is_empty());
    }

    #[test]
    fn new_jobs_get_distinct_ids() {
        let now = Utc::now();
        let a = Job::new("a job", JobPriority::Regular, now);
        let b = Job::new("a job", JobPriority::Regular, now);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn normalize_completes_running_job_at_full_progress() {
        let now = Utc::now();
        let mut job = Job::new("Report X", JobPriority::Regular, now);
        job.status = JobStatus::Running;
        job.progress = 104;

        job.normalize(now);

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn normalize_keeps_existing_completion_stamp() {
        let earlier = Utc::now() - chrono::Duration::minutes(5);
        let mut job = Job::new("done", JobPriority::Regular, earlier);
        job.status = JobStatus::Completed;
        job.progress = 40;
        job.completed_at = Some(earlier);

        job.normalize(Utc::now());

        assert_eq!(job.progress, 100);
        assert_eq!(job.completed_at, Some(earlier));
    }

    #[test]
    fn normalize_clears_timestamps_that_no_longer_fit() {
        let now = Utc::now();
        let mut job = Job::new("rewound", JobPriority::Regular, now);
        job.status = JobStatus::Pending;
        job.started_at = Some(now);
        job.completed_at = Some(now);

        job.normalize(now);

        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn normalize_clamps_negative_progress() {
        let mut job = Job::new("neg", JobPriority::Regular, Utc::now());
        job.progress = -7;
        job.normalize(Utc::now());
        assert_eq!(job.progress, 0);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn clamp_progress_bounds() {
        assert_eq!(clamp_progress(-1), 0);
        assert_eq!(clamp_progress(55), 55);
        assert_eq!(clamp_progress(1_000), 100);
    }

    #[test]
    fn sync_update_omits_name_unless_echoed() {
        let job = Job::new("Log Analysis", JobPriority::Regular, Utc::now());

        let json = serde_json::to_value(SyncUpdate::from_job(&job, false)).unwrap();
        assert!(json.get("name").is_none());
        assert_eq!(json["status"], 0);

        let json = serde_json::to_value(SyncUpdate::from_job(&job, true)).unwrap();
        assert_eq!(json["name"], "Log Analysis");
    }

    #[test]
    fn create_job_priority_defaults_to_regular() {
        let req: CreateJob = serde_json::from_str(r#"{"name":"abc"}"#).unwrap();
        assert_eq!(req.priority, JobPriority::Regular);
    }
}
