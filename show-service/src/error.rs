//! Domain errors for show operations and the acceptance queue.
//!
//! Handlers convert these into [`AppError`] at the HTTP boundary; the
//! acceptance updater only logs them.

use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShowError {
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid show id: {0}")]
    InvalidIdentifier(String),

    #[error("A show with the same date and time already exists")]
    DuplicateReleaseDate,

    #[error("Show not found: {0}")]
    NotFound(String),

    #[error("Malformed acceptance message: {0}")]
    MessageDecode(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(anyhow::Error),
}

impl ShowError {
    /// Whether retrying the same input could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ShowError::Store(_))
    }
}

impl From<mongodb::error::Error> for ShowError {
    fn from(err: mongodb::error::Error) -> Self {
        ShowError::Store(anyhow::Error::new(err))
    }
}

impl From<ShowError> for AppError {
    fn from(err: ShowError) -> Self {
        match err {
            ShowError::NotFound(_) => AppError::NotFound(anyhow::anyhow!(err.to_string())),
            ShowError::Store(cause) => AppError::DatabaseError(cause),
            other => AppError::BadRequest(anyhow::anyhow!(other.to_string())),
        }
    }
}
