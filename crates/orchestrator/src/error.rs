//! Turn-level error taxonomy.
//!
//! Every failure in a turn is recovered at the turn boundary and turned
//! into a structured `{"error": ...}` body with a status code; nothing in
//! this layer panics the process.

use history_service::HistoryError;
use provider_client::ProviderError;
use retrieval_config::BuildError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    History(#[from] HistoryError),
}

impl From<BuildError> for TurnError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Configuration(message) => TurnError::Configuration(message),
            BuildError::Authorization(message) => TurnError::Authorization(message),
        }
    }
}

impl TurnError {
    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            TurnError::Configuration(_) => 500,
            TurnError::Authorization(_) => 401,
            TurnError::Validation(_) => 400,
            TurnError::Provider(e) => e.status_code(),
            TurnError::History(e) => e.status_code(),
        }
    }

    /// The structured body sent to clients.
    pub fn to_body(&self) -> serde_json::Value {
        json!({ "error": self.to_string() })
    }
}
