use std::time::Duration;

use jobdeck_core::error::CoreError;

/// Errors surfaced by transports, the push channel and the sync layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Rejected locally before any network call.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The job is not in a state that permits the action.
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status not mapped above.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// A hub invocation was attempted while the push channel is down.
    #[error("Push channel is not connected")]
    NotConnected,

    /// The hub answered an invocation with an unmapped error.
    #[error("Hub error ({code}): {message}")]
    Hub { code: String, message: String },

    #[error("Hub invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    /// Map a server error code (`{"code": ...}` on REST, `error.code` on
    /// the hub) to a typed error.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "VALIDATION_ERROR" | "BAD_REQUEST" => ClientError::Validation(message),
            "NOT_ALLOWED" => ClientError::NotAllowed(message),
            "NOT_FOUND" => ClientError::NotFound(message),
            _ => ClientError::Hub {
                code: code.to_string(),
                message,
            },
        }
    }
}

impl From<CoreError> for ClientError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ClientError::Validation(msg),
            CoreError::NotAllowed(msg) => ClientError::NotAllowed(msg),
            CoreError::NotFound { entity, id } => {
                ClientError::NotFound(format!("{entity} with id {id} not found"))
            }
            CoreError::Internal(msg) => ClientError::Internal(msg),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
