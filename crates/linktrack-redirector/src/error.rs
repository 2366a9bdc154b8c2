use linktrack_core::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedirectorError {
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("storage operation failed: {0}")]
    Storage(
        #[from]
        #[source]
        StorageError,
    ),
}

pub type Result<T> = std::result::Result<T, RedirectorError>;
