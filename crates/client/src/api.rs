//! REST transport for the jobdeck server.
//!
//! Wraps the `/api/v1/jobs` endpoints using [`reqwest`]. Server errors
//! arrive as `{"error": message, "code": CODE}` and are mapped to typed
//! [`ClientError`] variants.

use std::time::Duration;

use async_trait::async_trait;
use jobdeck_core::job::{ActionResult, BulkDeleteResult, CreateJob, Job};
use jobdeck_core::status::{JobPriority, JobStatus};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ClientError, ClientResult};
use crate::transport::TransportAdapter;

/// `{"data": T}` envelope used by list/create/bulk-delete responses.
#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    code: String,
}

/// HTTP client for one jobdeck server.
pub struct RestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl RestTransport {
    /// * `base_url` - versioned API root, e.g. `http://host:3000/api/v1`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Reuse an existing [`reqwest::Client`] (shared connection pool).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}/jobs/<segments>` with each segment percent-encoded, so an
    /// opaque id containing `/`, `?` or `#` stays a single path segment.
    fn jobs_url(&self, segments: &[&str]) -> ClientResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ClientError::Config(format!("invalid API URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| ClientError::Config(format!("API URL {} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push("jobs")
            .extend(segments);
        Ok(url)
    }

    // ---- private helpers ----

    /// Return the response unchanged on 2xx, otherwise map the error body.
    async fn ensure_success(response: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());

        if let Ok(err) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(ClientError::from_code(&err.code, err.error));
        }

        Err(match status.as_u16() {
            404 => ClientError::NotFound(body),
            409 => ClientError::NotAllowed(body),
            code => ClientError::Api { status: code, body },
        })
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    async fn parse_data<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let envelope: DataEnvelope<T> = Self::parse_response(response).await?;
        Ok(envelope.data)
    }

    async fn check_status(response: reqwest::Response) -> ClientResult<()> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl TransportAdapter for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn fetch_all(&self) -> ClientResult<Vec<Job>> {
        let response = self.client.get(self.jobs_url(&[])?).send().await?;
        Self::parse_data(response).await
    }

    async fn create(&self, name: &str, priority: JobPriority) -> ClientResult<Job> {
        let body = CreateJob {
            name: name.to_string(),
            priority,
        };
        let response = self
            .client
            .post(self.jobs_url(&[])?)
            .json(&body)
            .send()
            .await?;
        Self::parse_data(response).await
    }

    async fn stop(&self, id: &str) -> ClientResult<ActionResult> {
        let response = self
            .client
            .post(self.jobs_url(&[id, "stop"])?)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn restart(&self, id: &str) -> ClientResult<ActionResult> {
        let response = self
            .client
            .post(self.jobs_url(&[id, "restart"])?)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn delete(&self, id: &str) -> ClientResult<()> {
        let response = self
            .client
            .delete(self.jobs_url(&[id])?)
            .send()
            .await?;
        Self::check_status(response).await
    }

    async fn delete_by_status(&self, status: JobStatus) -> ClientResult<usize> {
        let code = status.id().to_string();
        let response = self
            .client
            .delete(self.jobs_url(&["status", code.as_str()])?)
            .send()
            .await?;
        let result: BulkDeleteResult = Self::parse_data(response).await?;
        Ok(result.deleted)
    }
}
