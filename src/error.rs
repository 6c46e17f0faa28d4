//! Error taxonomy for station, reading and forecast operations.

use thiserror::Error;

use crate::store::StoreError;

// ---

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by the core operations.
///
/// Every variant except [`ServiceError::Store`] carries a message that is safe
/// to show to the caller. Store failures keep their cause for logging only.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed sort, filter, type, pagination or empty update.
    #[error("{0}")]
    Validation(String),

    /// A row with the same identity already exists.
    #[error("{0}")]
    Conflict(String),

    /// A referential constraint blocked the write.
    #[error("{0}")]
    Integrity(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
