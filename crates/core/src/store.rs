//! Ordered in-memory collection of jobs.
//!
//! Used as the single source of truth on both sides of the wire: the
//! server keeps one behind its state lock, and the client sync layer keeps
//! one mirroring what the server last told it. The store itself is not
//! synchronized; callers wrap it in the lock appropriate to their runtime.

use std::collections::HashSet;

use crate::error::CoreError;
use crate::job::{clamp_progress, Job, SyncUpdate};
use crate::status::{JobPriority, JobStatus};
use crate::transitions::{validate_bulk_delete, validate_transition, JobAction};
use crate::types::Timestamp;

#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Vec<Job>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an initial listing (same rules as `replace_all`).
    pub fn from_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let mut store = Self::new();
        store.replace_all(jobs);
        store
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn list(&self) -> &[Job] {
        &self.jobs
    }

    /// Owned copy of the current listing.
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn position(&self, id: &str) -> Result<usize, CoreError> {
        self.jobs
            .iter()
            .position(|j| j.id == id)
            .ok_or_else(|| CoreError::job_not_found(id))
    }

    // -----------------------------------------------------------------------
    // Synchronization
    // -----------------------------------------------------------------------

    /// Swap the whole collection. When the input repeats an id, the last
    /// occurrence wins and keeps its position.
    pub fn replace_all(&mut self, jobs: impl IntoIterator<Item = Job>) {
        let jobs: Vec<Job> = jobs.into_iter().collect();
        let mut seen = HashSet::new();
        let mut deduped: Vec<Job> = jobs
            .into_iter()
            .rev()
            .filter(|job| seen.insert(job.id.clone()))
            .collect();
        deduped.reverse();
        self.jobs = deduped;
    }

    /// Apply a delta. Returns `false` (and changes nothing) when the id is
    /// unknown; deltas never create records.
    pub fn patch(&mut self, update: &SyncUpdate, now: Timestamp) -> bool {
        let Some(job) = self.jobs.iter_mut().find(|j| j.id == update.id) else {
            return false;
        };

        job.status = update.status;
        job.progress = clamp_progress(update.progress);
        if let Some(name) = &update.name {
            job.name.clone_from(name);
        }
        job.normalize(now);
        true
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Apply a user action. Returns the job as it is after the action (for
    /// delete, the removed record). Nothing is mutated on error.
    pub fn apply_transition(&mut self, id: &str, action: JobAction) -> Result<Job, CoreError> {
        let idx = self.position(id)?;
        validate_transition(action, self.jobs[idx].status)?;

        match action {
            JobAction::Stop => {
                let job = &mut self.jobs[idx];
                job.status = JobStatus::Stopped;
                job.progress = 0;
                Ok(job.clone())
            }
            JobAction::Restart => {
                let job = &mut self.jobs[idx];
                job.status = JobStatus::Pending;
                job.progress = 0;
                job.error_message = None;
                job.started_at = None;
                job.completed_at = None;
                Ok(job.clone())
            }
            JobAction::Delete => Ok(self.jobs.remove(idx)),
        }
    }

    /// Append a new Pending job. Name validation is the caller's concern.
    pub fn create(&mut self, name: impl Into<String>, priority: JobPriority, now: Timestamp) -> Job {
        let job = Job::new(name, priority, now);
        self.jobs.push(job.clone());
        job
    }

    /// Add a job built elsewhere, replacing any record with the same id in
    /// place.
    pub fn insert(&mut self, job: Job) {
        match self.jobs.iter_mut().find(|j| j.id == job.id) {
            Some(existing) => *existing = job,
            None => self.jobs.push(job),
        }
    }

    /// Remove every job in `status`, returning how many were removed.
    pub fn delete_by_status(&mut self, status: JobStatus) -> Result<usize, CoreError> {
        validate_bulk_delete(status)?;
        let before = self.jobs.len();
        self.jobs.retain(|j| j.status != status);
        Ok(before - self.jobs.len())
    }

    /// Pending -> InQueue.
    pub fn enqueue(&mut self, id: &str) -> Result<Job, CoreError> {
        let idx = self.position(id)?;
        let job = &mut self.jobs[idx];
        if job.status != JobStatus::Pending {
            return Err(CoreError::NotAllowed(format!(
                "Only Pending jobs can be queued (job is {})",
                job.status
            )));
        }
        job.status = JobStatus::InQueue;
        Ok(job.clone())
    }

    /// Pending or InQueue -> Running at 0%, stamping `started_at`.
    pub fn start(&mut self, id: &str, now: Timestamp) -> Result<Job, CoreError> {
        let idx = self.position(id)?;
        let job = &mut self.jobs[idx];
        if !matches!(job.status, JobStatus::Pending | JobStatus::InQueue) {
            return Err(CoreError::NotAllowed(format!(
                "Only Pending or InQueue jobs can be started (job is {})",
                job.status
            )));
        }
        job.status = JobStatus::Running;
        job.progress = 0;
        job.started_at = Some(now);
        job.completed_at = None;
        Ok(job.clone())
    }

    /// Running -> Failed with an error message. Progress is kept.
    pub fn fail(&mut self, id: &str, message: impl Into<String>) -> Result<Job, CoreError> {
        let idx = self.position(id)?;
        let job = &mut self.jobs[idx];
        if job.status != JobStatus::Running {
            return Err(CoreError::NotAllowed(format!(
                "Only Running jobs can fail (job is {})",
                job.status
            )));
        }
        job.status = JobStatus::Failed;
        job.error_message = Some(message.into());
        Ok(job.clone())
    }

    /// Completed -> Pending, clearing progress, timestamps and error.
    pub fn recycle(&mut self, id: &str) -> Result<Job, CoreError> {
        let idx = self.position(id)?;
        let job = &mut self.jobs[idx];
        if job.status != JobStatus::Completed {
            return Err(CoreError::NotAllowed(format!(
                "Only Completed jobs can be recycled (job is {})",
                job.status
            )));
        }
        job.status = JobStatus::Pending;
        job.progress = 0;
        job.started_at = None;
        job.completed_at = None;
        job.error_message = None;
        Ok(job.clone())
    }

    /// Advance a Running job's progress; reaching 100 completes it.
    pub fn tick(&mut self, id: &str, increment: i16, now: Timestamp) -> Result<Job, CoreError> {
        let idx = self.position(id)?;
        let job = &mut self.jobs[idx];
        if job.status != JobStatus::Running {
            return Err(CoreError::NotAllowed(format!(
                "Only Running jobs can make progress (job is {})",
                job.status
            )));
        }
        job.progress = clamp_progress(i32::from(job.progress) + i32::from(increment));
        job.normalize(now);
        Ok(job.clone())
    }
}
