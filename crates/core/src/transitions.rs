//! User-initiated job actions and the source states that permit them.
//!
//! Lives in `core` so the server handlers, the hub, and the client-side
//! pre-checks all agree on the same table.

use crate::error::CoreError;
use crate::status::JobStatus;

/// A user-initiated action on a single job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobAction {
    Stop,
    Restart,
    Delete,
}

impl JobAction {
    /// Statuses from which this action may be applied.
    pub fn allowed_sources(self) -> &'static [JobStatus] {
        match self {
            JobAction::Stop => &[JobStatus::InQueue, JobStatus::Running],
            JobAction::Restart => &[JobStatus::Failed, JobStatus::Stopped],
            JobAction::Delete => &[JobStatus::Completed, JobStatus::Failed, JobStatus::Stopped],
        }
    }

    /// Whether this action may be applied to a job in `from`.
    pub fn allows(self, from: JobStatus) -> bool {
        self.allowed_sources().contains(&from)
    }

    /// Lowercase verb, used in logs.
    pub fn name(self) -> &'static str {
        match self {
            JobAction::Stop => "stop",
            JobAction::Restart => "restart",
            JobAction::Delete => "delete",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            JobAction::Stop => "stopped",
            JobAction::Restart => "restarted",
            JobAction::Delete => "deleted",
        }
    }

    /// Message returned alongside a successful action.
    pub fn success_message(self) -> String {
        format!("Job {} successfully", self.past_tense())
    }
}

impl std::fmt::Display for JobAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Validate that `action` may be applied to a job currently in `from`.
///
/// Produces messages such as `"Only InQueue or Running jobs can be stopped"`.
pub fn validate_transition(action: JobAction, from: JobStatus) -> Result<(), CoreError> {
    if action.allows(from) {
        return Ok(());
    }
    Err(CoreError::NotAllowed(format!(
        "Only {} jobs can be {} (job is {from})",
        join_statuses(action.allowed_sources()),
        action.past_tense(),
    )))
}

/// Validate a bulk delete target. Bulk delete follows the single-delete
/// rule, so only statuses a single job could be deleted from are accepted.
pub fn validate_bulk_delete(status: JobStatus) -> Result<(), CoreError> {
    if JobAction::Delete.allows(status) {
        return Ok(());
    }
    Err(CoreError::NotAllowed(format!(
        "Only {} jobs can be bulk deleted",
        join_statuses(JobAction::Delete.allowed_sources()),
    )))
}

/// `[A]` -> `"A"`, `[A, B]` -> `"A or B"`, `[A, B, C]` -> `"A, B, or C"`.
fn join_statuses(statuses: &[JobStatus]) -> String {
    let names: Vec<&str> = statuses.iter().map(|s| s.name()).collect();
    match names.as_slice() {
        [] => String::new(),
        [one] => (*one).to_string(),
        [a, b] => format!("{a} or {b}"),
        [head @ .., last] => format!("{}, or {last}", head.join(", ")),
    }
}
