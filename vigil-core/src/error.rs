use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Record not found")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid IP address: {0}")]
    InvalidIpAddress(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

impl Error {
    /// True when the underlying store is unreachable or timed out, i.e. the
    /// fail-open/fail-closed policy applies.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Storage(StorageError::Connection(_))
                | Error::Storage(StorageError::Timeout(_))
                | Error::Storage(StorageError::Database(_))
                | Error::Storage(StorageError::Conflict(_))
        )
    }

    pub fn is_validation_error(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}
