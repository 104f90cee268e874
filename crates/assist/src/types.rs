//! Error types shared by the domain services.

use thiserror::Error;

pub type AssistResult<T> = Result<T, AssistError>;

#[derive(Debug, Error)]
pub enum AssistError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("access denied: {0}")]
    AccessDenied(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Conflict(String),

    #[error("file too large: {size_bytes} bytes exceeds the {max_bytes} byte limit")]
    FileTooLarge { size_bytes: u64, max_bytes: u64 },

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("storage error: {0}")]
    Store(#[from] cybermitra_database::StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssistError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
