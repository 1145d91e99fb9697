//! Hub protocol: invocation dispatch and event broadcasting.

use std::sync::Arc;

use axum::extract::ws::Message;
use jobdeck_core::job::ActionResult;
use jobdeck_core::transitions::JobAction;
use jobdeck_events::{Completion, HubCommand, HubMessage, Invocation, JobEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};
use crate::service::JobService;
use crate::ws::manager::WsManager;

/// Encode a hub frame as a WebSocket text message.
pub fn text_frame(message: &HubMessage) -> AppResult<Message> {
    message
        .encode()
        .map(|text| Message::Text(text.into()))
        .map_err(|e| AppError::InternalError(format!("Failed to encode hub frame: {e}")))
}

/// Run one invocation against the job service. Always answers: failures
/// become a completion carrying the same error code REST would return.
pub async fn dispatch(jobs: &JobService, invocation: Invocation) -> Completion {
    let invocation_id = invocation.invocation_id;
    let target = invocation.command.target();

    match execute(jobs, invocation.command).await {
        Ok(result) => {
            tracing::debug!(invocation_id, target, "Hub invocation completed");
            Completion::ok(invocation_id, result)
        }
        Err(err) => {
            let (_, code, message) = err.classify();
            tracing::debug!(invocation_id, target, code, "Hub invocation failed");
            Completion::err(invocation_id, code, message)
        }
    }
}

async fn execute(jobs: &JobService, command: HubCommand) -> AppResult<serde_json::Value> {
    let value = match command {
        HubCommand::GetJobs => serde_json::to_value(jobs.list().await),
        HubCommand::CreateJob(input) => serde_json::to_value(jobs.create(input).await?),
        HubCommand::StopJob { id } => serde_json::to_value(jobs.stop(&id).await?),
        HubCommand::RestartJob { id } => serde_json::to_value(jobs.restart(&id).await?),
        HubCommand::DeleteJob { id } => {
            jobs.delete(&id).await?;
            serde_json::to_value(ActionResult::ok(JobAction::Delete.success_message()))
        }
        HubCommand::DeleteJobsByStatus { status } => {
            serde_json::to_value(jobs.delete_by_status(status).await?)
        }
    };
    value.map_err(|e| AppError::InternalError(format!("Failed to encode result: {e}")))
}

/// Forward every bus event to all hub connections until the bus closes or
/// `cancel` fires.
pub async fn run_broadcaster(
    ws_manager: Arc<WsManager>,
    mut events: broadcast::Receiver<JobEvent>,
    cancel: CancellationToken,
) {
    tracing::info!("Hub broadcaster started");
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        match event {
            Ok(event) => {
                let kind = event.kind();
                match text_frame(&HubMessage::from(event)) {
                    Ok(frame) => {
                        ws_manager.broadcast(frame).await;
                        tracing::trace!(kind, "Hub event broadcast");
                    }
                    Err(e) => tracing::error!(kind, error = %e, "Dropping hub event"),
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                // Clients recover on the next full listing.
                tracing::warn!(skipped, "Hub broadcaster lagged behind the event bus");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::info!("Hub broadcaster stopped");
}
