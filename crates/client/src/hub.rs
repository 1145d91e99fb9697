//! Transport that invokes hub methods over the push channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jobdeck_core::job::{ActionResult, BulkDeleteResult, CreateJob, Job};
use jobdeck_core::status::{JobPriority, JobStatus};
use jobdeck_events::{Completion, HubCommand, HubMessage, Invocation};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::error::RecvError;

use crate::error::{ClientError, ClientResult};
use crate::push::PushChannel;
use crate::reconnect::ConnectionState;
use crate::transport::TransportAdapter;

/// Sends each command as an `invocation` frame and waits for the matching
/// `completion`. Fails fast with [`ClientError::NotConnected`] while the
/// channel is down; never queues commands for later.
pub struct HubTransport {
    channel: Arc<PushChannel>,
    next_id: AtomicU64,
    timeout: Duration,
}

impl HubTransport {
    pub fn new(channel: Arc<PushChannel>, timeout: Duration) -> Self {
        Self {
            channel,
            next_id: AtomicU64::new(1),
            timeout,
        }
    }

    async fn invoke<T: DeserializeOwned>(&self, command: HubCommand) -> ClientResult<T> {
        if self.channel.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }

        let invocation_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let target = command.target();

        // Subscribe before sending so the completion cannot slip past.
        let mut completions = self.channel.subscribe_completions();
        self.channel
            .send(&HubMessage::Invocation(Invocation {
                invocation_id,
                command,
            }))
            .await?;
        tracing::debug!(invocation_id, target, "Hub invocation sent");

        let wait = async {
            loop {
                match completions.recv().await {
                    Ok(c) if c.invocation_id == invocation_id => return Ok(c),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(invocation_id, skipped, "Completion receiver lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => return Err(ClientError::NotConnected),
                }
            }
        };

        let completion: Completion = tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;

        if let Some(err) = completion.error {
            tracing::debug!(invocation_id, target, code = %err.code, "Hub invocation failed");
            return Err(ClientError::from_code(&err.code, err.message));
        }

        let result = completion.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(result)?)
    }
}

#[async_trait]
impl TransportAdapter for HubTransport {
    fn name(&self) -> &'static str {
        "hub"
    }

    async fn fetch_all(&self) -> ClientResult<Vec<Job>> {
        self.invoke(HubCommand::GetJobs).await
    }

    async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job> {
        self.invoke(HubCommand::CreateJob(CreateJob {
            name: name.to_string(),
            priority,
        }))
        .await
    }

    async fn stop(&self, id: &str) -> ClientResult<ActionResult> {
        self.invoke(HubCommand::StopJob { id: id.to_string() }).await
    }

    async fn restart(&self, id: &str) -> ClientResult<ActionResult> {
        self.invoke(HubCommand::RestartJob { id: id.to_string() })
            .await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        let _: ActionResult = self
            .invoke(HubCommand::DeleteJob { id: id.to_string() })
            .await?;
        Ok(())
    }

    async fn delete_by_status(&self, status: JobStatus) -> ClientResult<usize> {
        let result: BulkDeleteResult = self
            .invoke(HubCommand::DeleteJobsByStatus { status })
            .await?;
        Ok(result.deleted)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::reconnect::ReconnectPolicy;

    #[tokio::test]
    async fn fails_fast_when_not_connected() {
        let channel = PushChannel::new("ws://127.0.0.1:9/hub", ReconnectPolicy::default());
        let hub = HubTransport::new(channel, Duration::from_secs(1));

        assert_matches!(hub.fetch_all().await, Err(ClientError::NotConnected));
        assert_matches!(
            hub.create("Nightly Backup", JobPriority::High).await,
            Err(ClientError::NotConnected)
        );
    }
}
