//! The seam between the sync layer and a concrete backend.

use async_trait::async_trait;
use jobdeck_core::job::{ActionResult, Job};
use jobdeck_core::status::{JobPriority, JobStatus};

use crate::error::ClientResult;

/// One network call per operation; no retries, no local state.
///
/// Implementations are chosen once when the client is constructed:
/// [`RestTransport`](crate::api::RestTransport),
/// [`HubTransport`](crate::hub::HubTransport) or
/// [`MockTransport`](crate::mock::MockTransport). The caller reflects a
/// successful mutation in its own store.
#[async_trait]
pub trait TransportAdapter: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    async fn fetch_all(&self) -> ClientResult<Vec<Job>>;

    async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job>;

    async fn stop(&self, id: &str) -> ClientResult<ActionResult>;

    async fn restart(&self, id: &str) -> ClientResult<ActionResult>;

    async fn delete(&self, id: &str) -> ClientResult<()>;

    /// Returns the number of jobs removed.
    async fn delete_by_status(&self, status: JobStatus) -> ClientResult<usize>;
}
