//! Error taxonomy shared by the engine and the service layer.

use thiserror::Error;

/// Failures of a [`crate::ports::StoragePort`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage url: {0}")]
    InvalidUrl(String),

    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage call timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum DiaryError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    /// Scorer or generator unreachable. Absorbed into a fallback and logged.
    #[error("external service degraded: {0}")]
    ExternalServiceDegraded(String),

    /// A best-effort storage delete failed. Logged; the operation completes.
    #[error("storage inconsistency: {0}")]
    StorageInconsistency(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DiaryError {
    pub fn not_found(kind: &str, id: i64) -> Self {
        Self::NotFound(format!("{kind} {id}"))
    }

    pub fn forbidden(kind: &str, id: i64) -> Self {
        Self::Forbidden(format!("{kind} {id} belongs to another user"))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<tokio::task::JoinError> for DiaryError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

impl From<serde_json::Error> for DiaryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(anyhow::Error::new(err))
    }
}

pub type DiaryResult<T> = Result<T, DiaryError>;
