//! Error types surfaced by the request service.
//!
//! Missing grades are not errors: an enrollment without gradable evaluations
//! flows through the engine as an ungraded course.

use thiserror::Error;

/// Failures a caller can distinguish without string matching.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The request itself is malformed (missing id, bad term number, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced student or term does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// The record source failed; passed through unchanged.
    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

impl EngineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        EngineError::InvalidInput(message.into())
    }

    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Returns `true` when the caller sent a bad request rather than the
    /// lookup collaborator failing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidInput(_) | EngineError::NotFound { .. }
        )
    }
}
