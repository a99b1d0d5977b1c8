//! History service error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("History store is not configured: {0}")]
    NotConfigured(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HistoryError {
    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            HistoryError::NotFound(_) => 404,
            HistoryError::Validation(_) => 400,
            HistoryError::Credentials(_) => 401,
            HistoryError::NotConfigured(_) => 422,
            HistoryError::Storage(_) | HistoryError::Serialization(_) | HistoryError::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
