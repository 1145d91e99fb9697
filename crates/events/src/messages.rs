//! Hub WebSocket message types and parser.
//!
//! Every frame is a JSON text message of the shape
//! `{"type": "<kind>", "data": ...}`. Server-to-client pushes carry either
//! the full listing (`jobs_updated`) or a single delta
//! (`update_job_progress`). Remote commands travel as an `invocation`
//! answered by exactly one `completion` with the same `invocation_id`.

use jobdeck_core::job::{CreateJob, Job, SyncUpdate};
use jobdeck_core::status::JobStatus;
use jobdeck_core::types::JobId;
use serde::{Deserialize, Serialize};

use crate::bus::JobEvent;

/// All hub frame types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum HubMessage {
    /// Full job listing.
    #[serde(rename = "jobs_updated")]
    JobsUpdated(Vec<Job>),

    /// One job's status/progress changed.
    #[serde(rename = "update_job_progress")]
    UpdateJobProgress(SyncUpdate),

    /// Client -> server command.
    #[serde(rename = "invocation")]
    Invocation(Invocation),

    /// Server -> client answer to an invocation.
    #[serde(rename = "completion")]
    Completion(Completion),
}

impl HubMessage {
    /// The push event carried by this frame, if it is one.
    pub fn into_event(self) -> Option<JobEvent> {
        match self {
            HubMessage::JobsUpdated(jobs) => Some(JobEvent::JobsUpdated(jobs)),
            HubMessage::UpdateJobProgress(update) => Some(JobEvent::JobProgress(update)),
            HubMessage::Invocation(_) | HubMessage::Completion(_) => None,
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A remote command with its correlation id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub invocation_id: u64,
    pub command: HubCommand,
}

/// Hub methods a client may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", content = "arguments")]
pub enum HubCommand {
    GetJobs,
    CreateJob(CreateJob),
    StopJob { id: JobId },
    RestartJob { id: JobId },
    DeleteJob { id: JobId },
    DeleteJobsByStatus { status: JobStatus },
}

impl HubCommand {
    pub fn target(&self) -> &'static str {
        match self {
            HubCommand::GetJobs => "GetJobs",
            HubCommand::CreateJob(_) => "CreateJob",
            HubCommand::StopJob { .. } => "StopJob",
            HubCommand::RestartJob { .. } => "RestartJob",
            HubCommand::DeleteJob { .. } => "DeleteJob",
            HubCommand::DeleteJobsByStatus { .. } => "DeleteJobsByStatus",
        }
    }
}

/// Result of an invocation: exactly one of `result` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub invocation_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HubError>,
}

impl Completion {
    pub fn ok(invocation_id: u64, result: serde_json::Value) -> Self {
        Self {
            invocation_id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(invocation_id: u64, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            invocation_id,
            result: None,
            error: Some(HubError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Error payload of a failed invocation; `code` matches the REST error codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubError {
    pub code: String,
    pub message: String,
}

/// Parse a hub text frame.
///
/// Returns `Err` for malformed JSON or unknown `type` values. Callers
/// should log and continue.
pub fn parse_message(text: &str) -> Result<HubMessage, serde_json::Error> {
    serde_json::from_str(text)
}
