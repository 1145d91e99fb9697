#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The record exists but is not in a state that permits the operation.
    #[error("Not allowed: {0}")]
    NotAllowed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a missing job.
    pub fn job_not_found(id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: "Job",
            id: id.into(),
        }
    }
}
