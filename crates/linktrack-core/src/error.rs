use thiserror::Error;

/// Errors raised by a link store backend.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The storage engine rejected the insert because the code is already present.
    #[error("short code already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// Errors returned by the shortener.
#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A caller-chosen code is already reserved by another link.
    #[error("short code already taken: {0}")]
    CodeTaken(String),
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("no free short code after {attempts} attempts")]
    AllocationExhausted { attempts: usize },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ShortenerError {
    /// Returns `true` for errors caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::InvalidShortCode(_)
                | Self::InvalidInput(_)
                | Self::CodeTaken(_)
                | Self::NotFound(_)
        )
    }
}
